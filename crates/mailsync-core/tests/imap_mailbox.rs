//! `ImapMailbox` against a loopback IMAP server.

#![allow(clippy::unwrap_used, clippy::panic)]

use std::fmt::Write as _;
use std::sync::{Arc, Mutex};

use mailsync_core::{
    Error, FetchStage, ImapMailbox, MailboxErrorKind, Remediation, RemoteMailbox,
    ServerSettings, Timeouts,
};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

struct Stored {
    uid: u32,
    flags: &'static str,
    raw: String,
}

fn stored(uid: u32, subject: &str, flags: &'static str) -> Stored {
    Stored {
        uid,
        flags,
        raw: format!(
            "From: Bob <bob@example.com>\r\nTo: alice@example.com\r\nSubject: {subject}\r\n\
             Date: Tue, 02 Jan 2024 10:00:00 +0000\r\n\r\nHello {subject}\r\n"
        ),
    }
}

/// How the loopback server behaves.
struct Script {
    messages: Vec<Stored>,
    password: &'static str,
    capabilities: &'static str,
    /// Command keyword answered with NO.
    refuse: Option<&'static str>,
}

impl Script {
    const fn new(messages: Vec<Stored>) -> Self {
        Self {
            messages,
            password: "secret",
            capabilities: "IMAP4rev1 UIDPLUS",
            refuse: None,
        }
    }
}

/// Commands received, tags stripped, across every connection.
type Log = Arc<Mutex<Vec<String>>>;

/// Serves every connection, answering by command keyword.
async fn server(script: Script) -> (u16, Log) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let script = Arc::new(script);
    let log = Log::default();

    let accepted = Arc::clone(&log);
    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                return;
            };
            let script = Arc::clone(&script);
            let log = Arc::clone(&accepted);
            tokio::spawn(async move {
                let (read, mut write) = socket.into_split();
                let mut reader = BufReader::new(read);
                let greeting = format!("* OK [CAPABILITY {}] ready\r\n", script.capabilities);
                write.write_all(greeting.as_bytes()).await.unwrap();
                loop {
                    let mut line = String::new();
                    if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
                        return;
                    }
                    let line = line.trim_end().to_string();
                    let (tag, command) = line.split_once(' ').unwrap_or((&line, ""));
                    log.lock().unwrap().push(command.to_string());

                    if let Some(size) = literal_size(command) {
                        write.write_all(b"+ go ahead\r\n").await.unwrap();
                        let mut literal = vec![0; size + 2];
                        reader.read_exact(&mut literal).await.unwrap();
                        literal.truncate(size);
                        log.lock()
                            .unwrap()
                            .push(String::from_utf8(literal).unwrap());
                        let reply = format!("{tag} OK [APPENDUID 1 77] appended\r\n");
                        write.write_all(reply.as_bytes()).await.unwrap();
                        continue;
                    }

                    let reply = respond(tag, command, &script);
                    write.write_all(reply.as_bytes()).await.unwrap();
                    if command.eq_ignore_ascii_case("LOGOUT") {
                        return;
                    }
                }
            });
        }
    });

    (port, log)
}

fn literal_size(command: &str) -> Option<usize> {
    command
        .strip_suffix('}')
        .and_then(|rest| rest.rsplit_once('{'))
        .and_then(|(_, n)| n.parse().ok())
}

fn respond(tag: &str, command: &str, script: &Script) -> String {
    let mut words = command.split_whitespace();
    let mut keyword = words.next().unwrap_or_default().to_ascii_uppercase();
    if keyword == "UID" {
        keyword = words.next().unwrap_or_default().to_ascii_uppercase();
    }
    if script.refuse == Some(keyword.as_str()) {
        return format!("{tag} NO [CANNOT] refused\r\n");
    }
    let messages = &script.messages;

    match keyword.as_str() {
        "LOGIN" if command.contains(script.password) => format!("{tag} OK logged in\r\n"),
        "LOGIN" => format!("{tag} NO [AUTHENTICATIONFAILED] invalid credentials\r\n"),
        "EXAMINE" | "SELECT" => format!(
            "* {} EXISTS\r\n* OK [UIDVALIDITY 1] ok\r\n{tag} OK done\r\n",
            messages.len()
        ),
        "SEARCH" => {
            let mut out = String::from("* SEARCH");
            for m in messages {
                let _ = write!(out, " {}", m.uid);
            }
            out.push_str("\r\n");
            let _ = write!(out, "{tag} OK done\r\n");
            out
        }
        "FETCH" => {
            let mut out = String::new();
            for (seq, m) in messages.iter().enumerate() {
                let _ = write!(
                    out,
                    "* {} FETCH (UID {} FLAGS ({}) INTERNALDATE \"02-Jan-2024 10:00:00 +0000\" BODY[] {{{}}}\r\n{})\r\n",
                    seq + 1,
                    m.uid,
                    m.flags,
                    m.raw.len(),
                    m.raw
                );
            }
            let _ = write!(out, "{tag} OK done\r\n");
            out
        }
        "STORE" => format!("{tag} OK stored\r\n"),
        "EXPUNGE" => format!("* 1 EXPUNGE\r\n{tag} OK expunged\r\n"),
        "MOVE" => format!("* OK [COPYUID 1 7 205] moving\r\n* 1 EXPUNGE\r\n{tag} OK moved\r\n"),
        "COPY" => format!("{tag} OK [COPYUID 1 7 205] copied\r\n"),
        "LIST" => format!(
            "* LIST (\\HasNoChildren) \"/\" \"INBOX\"\r\n* LIST () \"/\" \"Sent\"\r\n{tag} OK done\r\n"
        ),
        "LOGOUT" => format!("* BYE bye\r\n{tag} OK done\r\n"),
        _ => format!("{tag} BAD unknown command\r\n"),
    }
}

fn mailbox(port: u16, password: &str) -> ImapMailbox {
    ImapMailbox::new(
        ServerSettings::new("127.0.0.1", port, "alice", password, false),
        Timeouts::default(),
    )
}

fn commands(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

#[tokio::test]
async fn empty_folder_yields_no_messages() {
    let (port, _) = server(Script::new(Vec::new())).await;
    let messages = mailbox(port, "secret").fetch_messages("INBOX", None).await.unwrap();
    assert!(messages.is_empty());
}

#[tokio::test]
async fn fetch_parses_every_message_in_uid_order() {
    let (port, log) = server(Script::new(vec![
        stored(10, "first", "\\Seen"),
        stored(12, "second", ""),
    ]))
    .await;

    let mut stages = Vec::new();
    let messages = mailbox(port, "secret")
        .fetch_messages_with("INBOX", None, &mut |stage: FetchStage| stages.push(stage))
        .await
        .unwrap();

    assert_eq!(
        stages,
        vec![FetchStage::Listing, FetchStage::FetchingBatch { count: 2 }]
    );
    let uids: Vec<u32> = messages.iter().map(|m| m.uid).collect();
    assert_eq!(uids, vec![10, 12]);
    assert_eq!(messages[0].subject, "first");
    assert_eq!(messages[0].from, "Bob <bob@example.com>");
    assert!(messages[0].is_read());
    assert!(!messages[1].is_read());
    assert_eq!(
        messages[1].text_body.as_deref().map(str::trim),
        Some("Hello second")
    );

    let sent = commands(&log);
    assert_eq!(sent[1], "EXAMINE INBOX");
    assert_eq!(sent.last().map(String::as_str), Some("LOGOUT"));
}

#[tokio::test]
async fn folders_are_listed() {
    let (port, _) = server(Script::new(Vec::new())).await;
    let folders = mailbox(port, "secret").list_folders().await.unwrap();
    assert_eq!(folders, vec!["INBOX".to_string(), "Sent".to_string()]);
}

#[tokio::test]
async fn flags_are_added_in_a_read_write_session() {
    let (port, log) = server(Script::new(vec![stored(7, "x", "")])).await;

    mailbox(port, "secret")
        .update_flags(7, &["\\Seen".to_string()], "INBOX")
        .await
        .unwrap();

    assert_eq!(
        commands(&log),
        vec![
            "LOGIN alice secret",
            "SELECT INBOX",
            "UID STORE 7 +FLAGS.SILENT (\\Seen)",
            "LOGOUT",
        ]
    );
}

#[tokio::test]
async fn delete_marks_then_expunges_only_that_uid() {
    let (port, log) = server(Script::new(vec![stored(7, "x", "")])).await;

    mailbox(port, "secret").delete_message(7, "Trash").await.unwrap();

    assert_eq!(
        commands(&log),
        vec![
            "LOGIN alice secret",
            "SELECT Trash",
            "UID STORE 7 +FLAGS.SILENT (\\Deleted)",
            "UID EXPUNGE 7",
            "LOGOUT",
        ]
    );
}

#[tokio::test]
async fn move_returns_the_copyuid_destination() {
    let mut script = Script::new(vec![stored(7, "x", "")]);
    script.capabilities = "IMAP4rev1 UIDPLUS MOVE";
    let (port, log) = server(script).await;

    let new_uid = mailbox(port, "secret")
        .move_message(7, "INBOX", "Trash")
        .await
        .unwrap();

    assert_eq!(new_uid, Some(205));
    assert_eq!(
        commands(&log),
        vec!["LOGIN alice secret", "SELECT INBOX", "UID MOVE 7 Trash", "LOGOUT"]
    );
}

#[tokio::test]
async fn move_without_move_extension_copies_then_expunges() {
    let (port, log) = server(Script::new(vec![stored(7, "x", "")])).await;

    let new_uid = mailbox(port, "secret")
        .move_message(7, "INBOX", "Trash")
        .await
        .unwrap();

    assert_eq!(new_uid, Some(205));
    assert_eq!(
        commands(&log),
        vec![
            "LOGIN alice secret",
            "SELECT INBOX",
            "UID COPY 7 Trash",
            "UID STORE 7 +FLAGS.SILENT (\\Deleted)",
            "UID EXPUNGE 7",
            "LOGOUT",
        ]
    );
}

#[tokio::test]
async fn append_sends_the_message_as_a_literal() {
    let (port, log) = server(Script::new(Vec::new())).await;
    let raw = "Subject: hi\r\n\r\nbody";

    let uid = mailbox(port, "secret")
        .append_message("Sent", raw.as_bytes(), &["\\Seen".to_string()])
        .await
        .unwrap();

    assert_eq!(uid, Some(77));
    assert_eq!(
        commands(&log),
        vec![
            "LOGIN alice secret".to_string(),
            format!("APPEND Sent (\\Seen) {{{}}}", raw.len()),
            raw.to_string(),
            "LOGOUT".to_string(),
        ]
    );
}

#[tokio::test]
async fn refused_command_still_logs_out() {
    let mut script = Script::new(vec![stored(7, "x", "")]);
    script.refuse = Some("STORE");
    let (port, log) = server(script).await;

    let err = mailbox(port, "secret")
        .update_flags(7, &["\\Seen".to_string()], "INBOX")
        .await
        .unwrap_err();

    assert_eq!(err.operation, "update_flags");
    assert_eq!(err.folder.as_deref(), Some("INBOX"));
    assert!(matches!(err.kind, MailboxErrorKind::Protocol(_)));
    assert_eq!(commands(&log).last().map(String::as_str), Some("LOGOUT"));
}

#[tokio::test]
async fn rejected_login_is_an_auth_error() {
    let (port, _) = server(Script::new(Vec::new())).await;
    let err = mailbox(port, "wrong")
        .fetch_messages("INBOX", None)
        .await
        .unwrap_err();

    assert_eq!(err.operation, "fetch_messages");
    assert!(matches!(err.kind, MailboxErrorKind::Auth(_)));
    assert_eq!(Error::from(err).remediation(), Remediation::Reconfigure);
}

#[tokio::test]
async fn unreachable_server_is_a_connect_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let err = mailbox(port, "secret").list_folders().await.unwrap_err();
    assert!(matches!(err.kind, MailboxErrorKind::Connect(_)));
    assert_eq!(Error::from(err).remediation(), Remediation::RetryLater);
}
