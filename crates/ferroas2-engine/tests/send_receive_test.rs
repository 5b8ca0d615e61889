//! File transfers between two local partners.
//!
//! Run with: `cargo test -p ferroas2-engine --test send_receive_test`

mod helpers;

use ferroas2_core::models::message::{STATUS_PENDING, STATUS_SENT};
use ferroas2_core::models::{MdnMode, OutgoingFileMessage};
use ferroas2_core::validation::make_file_name;
use ferroas2_core::{As2Error, EventLevel, Phase};
use ferroas2_crypto::testing::paired_stores;
use ferroas2_crypto::MemoryCertificateStore;
use ferroas2_engine::{EngineSettings, FileSender};
use helpers::{
    eventually, files_in, listener, partner, serve_file_receiver, serve_mdn_receiver, Party,
    RECEIVER, SENDER,
};

const ORDER: &[u8] = b"ISA*00*          *00*          *ZZ*ACME           *ZZ*PARTNERB       *~\r\nGS*PO*ACME*PARTNERB~\r\n";

#[test]
fn test_send_stages_run_in_protocol_order() {
    let sender = Party::new(
        SENDER,
        MemoryCertificateStore::new(),
        vec![partner(RECEIVER, "http://partnerb.invalid", "SHA1", "3DES", MdnMode::Standard)],
        EngineSettings::default(),
    );

    assert_eq!(
        FileSender::new(sender.services.clone()).stage_names(),
        vec![
            "ServerEvent",
            "BuildBody",
            "SignAndEncrypt",
            "ValidateMessage",
            "Transmit",
            "ReceiveMdn",
        ]
    );
}

#[tokio::test]
async fn test_signed_file_with_sync_mdn() {
    let (sender_certs, receiver_certs) = paired_stores(SENDER, RECEIVER);
    let (file_listener, file_url) = listener().await;

    let receiver = Party::new(
        RECEIVER,
        receiver_certs,
        vec![partner(SENDER, "", "", "", MdnMode::None)],
        EngineSettings::default(),
    );
    serve_file_receiver(file_listener, receiver.services.clone());

    let sender = Party::new(
        SENDER,
        sender_certs,
        vec![partner(RECEIVER, &file_url, "SHA1", "", MdnMode::Standard)],
        EngineSettings::default(),
    );
    let path = sender.outbox_file(RECEIVER, "order.edi", ORDER);

    let sent = FileSender::new(sender.services.clone())
        .send_file(OutgoingFileMessage::new(&path, SENDER, RECEIVER))
        .await
        .unwrap();

    assert_eq!(sent.status, STATUS_SENT);
    let (digest, algorithm) = sent.outgoing_mic.split_once(", ").unwrap();
    assert!(!digest.is_empty());
    assert!(algorithm.eq_ignore_ascii_case("sha1"));
    assert!(sent.content_type.starts_with("multipart/signed"));

    let received = receiver.dirs.inbox.join(SENDER).join("order.edi");
    assert_eq!(std::fs::read(received).unwrap(), ORDER);

    assert!(!path.exists());
    assert!(sender.dirs.sent.join(RECEIVER).join("order.edi").exists());

    let mdn_file = sender
        .dirs
        .mdn
        .join(format!("{}.mdn.json", make_file_name(&sent.message_id)));
    let mdn_json = std::fs::read_to_string(mdn_file).unwrap();
    assert!(mdn_json.contains(digest));
    assert!(mdn_json.contains("automatic-action/mdn-sent-automatically; processed"));

    assert!(sender
        .events
        .has(EventLevel::Info, Phase::FileSend, "File Send Finished"));
    assert!(receiver
        .events
        .has(EventLevel::Info, Phase::FileReceive, "File receive finished"));
}

#[tokio::test]
async fn test_signed_and_encrypted_file_with_sync_mdn() {
    let (sender_certs, receiver_certs) = paired_stores(SENDER, RECEIVER);
    let (file_listener, file_url) = listener().await;

    let receiver = Party::new(RECEIVER, receiver_certs, vec![], EngineSettings::default());
    serve_file_receiver(file_listener, receiver.services.clone());

    let sender = Party::new(
        SENDER,
        sender_certs,
        vec![partner(RECEIVER, &file_url, "SHA256", "AES256", MdnMode::Standard)],
        EngineSettings::default(),
    );
    let path = sender.outbox_file(RECEIVER, "invoice.edi", ORDER);

    let sent = FileSender::new(sender.services.clone())
        .send_file(OutgoingFileMessage::new(&path, SENDER, RECEIVER))
        .await
        .unwrap();

    assert_eq!(sent.status, STATUS_SENT);
    assert!(sent.content_type.starts_with("application/pkcs7-mime"));
    let received = receiver.dirs.inbox.join(SENDER).join("invoice.edi");
    assert_eq!(std::fs::read(received).unwrap(), ORDER);
}

#[tokio::test]
async fn test_plain_file_without_mdn() {
    let (sender_certs, receiver_certs) = paired_stores(SENDER, RECEIVER);
    let (file_listener, file_url) = listener().await;

    let receiver = Party::new(RECEIVER, receiver_certs, vec![], EngineSettings::default());
    serve_file_receiver(file_listener, receiver.services.clone());

    let sender = Party::new(
        SENDER,
        sender_certs,
        vec![partner(RECEIVER, &file_url, "", "", MdnMode::None)],
        EngineSettings::default(),
    );
    let path = sender.outbox_file(RECEIVER, "plain.edi", ORDER);

    let sent = FileSender::new(sender.services.clone())
        .send_file(OutgoingFileMessage::new(&path, SENDER, RECEIVER))
        .await
        .unwrap();

    assert_eq!(sent.status, STATUS_SENT);
    assert_eq!(sent.content_type, "application/edi-x12");
    assert!(receiver.dirs.inbox.join(SENDER).join("plain.edi").exists());
    assert!(sender.dirs.sent.join(RECEIVER).join("plain.edi").exists());
}

#[tokio::test]
async fn test_async_mdn_round_trip() {
    let (sender_certs, receiver_certs) = paired_stores(SENDER, RECEIVER);
    let (file_listener, file_url) = listener().await;
    let (mdn_listener, mdn_url) = listener().await;

    let receiver = Party::new(RECEIVER, receiver_certs, vec![], EngineSettings::default());
    serve_file_receiver(file_listener, receiver.services.clone());

    let sender = Party::new(
        SENDER,
        sender_certs,
        vec![partner(RECEIVER, &file_url, "SHA1", "3DES", MdnMode::Async)],
        EngineSettings {
            async_mdn_url: mdn_url,
            ..Default::default()
        },
    );
    serve_mdn_receiver(mdn_listener, sender.services.clone());
    let path = sender.outbox_file(RECEIVER, "async.edi", ORDER);

    let sent = FileSender::new(sender.services.clone())
        .send_file(OutgoingFileMessage::new(&path, SENDER, RECEIVER))
        .await
        .unwrap();

    assert_eq!(sent.status, STATUS_PENDING);
    assert!(sent.pending_info.info_file.is_some());

    let events = sender.events.clone();
    assert!(
        eventually(|| events.has(
            EventLevel::Info,
            Phase::MdnAsyncReceive,
            "MDN received successfully"
        ))
        .await
    );
    assert!(files_in(&sender.dirs.pending_mdn_info).is_empty());
    assert!(files_in(&sender.dirs.pending_mdn).is_empty());
    assert!(receiver.dirs.inbox.join(SENDER).join("async.edi").exists());
    assert!(receiver
        .events
        .has(EventLevel::Info, Phase::MdnSend, "Async MDN sent"));
}

#[tokio::test]
async fn test_partner_error_status_fails_send() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .with_status(500)
        .with_body("internal error")
        .create_async()
        .await;

    let (sender_certs, _) = paired_stores(SENDER, RECEIVER);
    let sender = Party::new(
        SENDER,
        sender_certs,
        vec![partner(RECEIVER, &server.url(), "SHA1", "", MdnMode::Standard)],
        EngineSettings::default(),
    );
    let path = sender.outbox_file(RECEIVER, "order.edi", ORDER);

    let err = FileSender::new(sender.services.clone())
        .send_file(OutgoingFileMessage::new(&path, SENDER, RECEIVER))
        .await
        .unwrap_err();

    mock.assert_async().await;
    assert!(matches!(err, As2Error::Transport { status: Some(500), .. }));
    assert!(path.exists());
    assert!(sender
        .events
        .has(EventLevel::Error, Phase::FileSend, "Error Sending File"));
}

#[tokio::test]
async fn test_partner_without_mdn_body_fails_send() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/")
        .match_header("AS2-To", RECEIVER)
        .match_header("Disposition-Notification-To", "as2@partnerb.example")
        .with_status(200)
        .create_async()
        .await;

    let (sender_certs, _) = paired_stores(SENDER, RECEIVER);
    let sender = Party::new(
        SENDER,
        sender_certs,
        vec![partner(RECEIVER, &server.url(), "SHA1", "", MdnMode::Standard)],
        EngineSettings::default(),
    );
    let path = sender.outbox_file(RECEIVER, "order.edi", ORDER);

    let err = FileSender::new(sender.services.clone())
        .send_file(OutgoingFileMessage::new(&path, SENDER, RECEIVER))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("body was empty"));
    assert!(path.exists());
}

#[tokio::test]
async fn test_unknown_partner_is_rejected() {
    let (sender_certs, _) = paired_stores(SENDER, RECEIVER);
    let sender = Party::new(SENDER, sender_certs, vec![], EngineSettings::default());
    let path = sender.outbox_file(RECEIVER, "order.edi", ORDER);

    let err = FileSender::new(sender.services.clone())
        .send_file(OutgoingFileMessage::new(&path, SENDER, RECEIVER))
        .await
        .unwrap_err();

    assert!(matches!(err, As2Error::Config(_)));
}
