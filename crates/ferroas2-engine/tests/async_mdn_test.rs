//! Async MDN receipt processing against a real pending record.
//!
//! Run with: `cargo test -p ferroas2-engine --test async_mdn_test`

mod helpers;

use std::time::Duration;

use ferroas2_core::constants::header;
use ferroas2_core::models::{
    ConnectionInfo, IncomingFileMessage, IncomingMessage, MdnMode, MdnReceiveStatus,
    OutgoingFileMessage,
};
use ferroas2_core::{DispositionType, EventLevel, Headers, Phase};
use ferroas2_crypto::{MemoryCertificateStore, MimeEntity};
use ferroas2_engine::mdn::{build_reply_mdn, mdn_entity};
use ferroas2_engine::{AsyncMdnProcessor, EngineSettings};
use helpers::{files_in, partner, Party, RECEIVER, SENDER};

const MIC: &str = "dGhpcyBpcyBub3QgYSByZWFsIGRpZ2VzdA==, sha1";

fn sender() -> Party {
    sender_waiting(Duration::from_millis(300))
}

fn sender_waiting(pending_mdn_wait: Duration) -> Party {
    Party::new(
        SENDER,
        MemoryCertificateStore::new(),
        vec![partner(RECEIVER, "http://partnerb.invalid", "SHA1", "", MdnMode::Async)],
        EngineSettings {
            pending_mdn_wait,
            ..Default::default()
        },
    )
}

/// Spool a file as if it had been sent and is waiting on its receipt.
async fn pending_send(party: &Party) -> OutgoingFileMessage {
    let path = party.outbox_file(RECEIVER, "po.edi", b"ISA*00~");
    let mut message = OutgoingFileMessage::new(&path, SENDER, RECEIVER);
    message.outgoing_mic = MIC.to_string();
    party.services.store.save_pending_mdn(&mut message).await.unwrap();
    message
}

/// An MDN from the receiver acknowledging `message_id`, and the request it arrived on.
fn receipt(message_id: &str, disposition: &DispositionType, mic: &str) -> (IncomingMessage, MimeEntity) {
    let original_headers: Headers = [
        (header::AS2_FROM, SENDER),
        (header::AS2_TO, RECEIVER),
        (header::MESSAGE_ID, message_id),
    ]
    .into_iter()
    .collect();
    let original = IncomingFileMessage::new(IncomingMessage::new(
        original_headers,
        ConnectionInfo::default(),
    ));
    let mut reply =
        build_reply_mdn(&original, disposition, "edi@partnerb.example", "receipt text").unwrap();
    reply.attributes.received_content_mic = mic.to_string();

    let request_headers: Headers = [
        (header::AS2_FROM, RECEIVER),
        (header::AS2_TO, SENDER),
        (header::MESSAGE_ID, "<mdn-1@partnerb>"),
    ]
    .into_iter()
    .collect();
    (
        IncomingMessage::new(request_headers, ConnectionInfo::default()),
        mdn_entity(&reply),
    )
}

#[tokio::test]
async fn test_matching_receipt_clears_pending_record_once() {
    let party = sender();
    let message = pending_send(&party).await;
    let processor = AsyncMdnProcessor::new(party.services.clone());
    let (request, entity) = receipt(&message.message_id, &DispositionType::success(), MIC);

    assert_eq!(processor.process(&request, &entity).await, MdnReceiveStatus::Ok);
    assert!(files_in(&party.dirs.pending_mdn_info).is_empty());
    assert!(files_in(&party.dirs.pending_mdn).is_empty());
    assert!(party
        .events
        .has(EventLevel::Info, Phase::MdnAsyncReceive, "MDN received successfully"));

    // a duplicate delivery finds nothing left to match
    assert_eq!(
        processor.process(&request, &entity).await,
        MdnReceiveStatus::AsyncLoadError
    );
}

#[tokio::test]
async fn test_receipt_waits_for_pending_record() {
    let party = sender_waiting(Duration::from_secs(5));
    let path = party.outbox_file(RECEIVER, "early.edi", b"ISA*00~");
    let mut message = OutgoingFileMessage::new(&path, SENDER, RECEIVER);
    message.outgoing_mic = MIC.to_string();

    // the receipt is processed before the send has written its pending record
    let processor = AsyncMdnProcessor::new(party.services.clone());
    let (request, entity) = receipt(&message.message_id, &DispositionType::success(), MIC);
    let processing = tokio::spawn(async move { processor.process(&request, &entity).await });

    tokio::time::sleep(Duration::from_millis(250)).await;
    party.services.store.save_pending_mdn(&mut message).await.unwrap();

    assert_eq!(processing.await.unwrap(), MdnReceiveStatus::Ok);
    assert!(files_in(&party.dirs.pending_mdn_info).is_empty());
}

#[tokio::test]
async fn test_mic_comparison_ignores_whitespace() {
    let party = sender();
    let message = pending_send(&party).await;
    let processor = AsyncMdnProcessor::new(party.services.clone());
    let returned = MIC.replace(", ", ",");
    let (request, entity) = receipt(&message.message_id, &DispositionType::success(), &returned);

    assert_eq!(processor.process(&request, &entity).await, MdnReceiveStatus::Ok);
}

#[tokio::test]
async fn test_mic_mismatch_keeps_pending_record() {
    let party = sender();
    let message = pending_send(&party).await;
    let processor = AsyncMdnProcessor::new(party.services.clone());
    let (request, entity) = receipt(
        &message.message_id,
        &DispositionType::success(),
        "c29tZXRoaW5nIGVsc2U=, sha1",
    );

    let status = processor.process(&request, &entity).await;

    assert_eq!(status, MdnReceiveStatus::MicNotMatched);
    assert_eq!(status.http_status(), 404);
    assert_eq!(files_in(&party.dirs.pending_mdn_info).len(), 1);
    assert!(party
        .events
        .has(EventLevel::Error, Phase::MdnAsyncReceive, "MIC does not match"));
}

#[tokio::test]
async fn test_partner_failure_is_reported() {
    let party = sender();
    let message = pending_send(&party).await;
    let processor = AsyncMdnProcessor::new(party.services.clone());
    let (request, entity) = receipt(
        &message.message_id,
        &DispositionType::error("decryption-failed"),
        "",
    );

    let status = processor.process(&request, &entity).await;

    assert_eq!(status, MdnReceiveStatus::ProcessingFailed);
    assert_eq!(status.http_status(), 200);
    assert_eq!(files_in(&party.dirs.pending_mdn_info).len(), 1);
}

#[tokio::test]
async fn test_manual_disposition_is_invalid() {
    let party = sender();
    let message = pending_send(&party).await;
    let processor = AsyncMdnProcessor::new(party.services.clone());
    let manual = DispositionType::parse("manual-action/MDN-sent-manually; processed");
    let (request, entity) = receipt(&message.message_id, &manual, MIC);

    assert_eq!(
        processor.process(&request, &entity).await,
        MdnReceiveStatus::InvalidDisposition
    );
    assert_eq!(files_in(&party.dirs.pending_mdn_info).len(), 1);
}

#[tokio::test]
async fn test_report_without_notification_part() {
    let party = sender();
    let processor = AsyncMdnProcessor::new(party.services.clone());
    let (request, _) = receipt("<m1@acme>", &DispositionType::success(), MIC);
    let text_only = MimeEntity::multipart(
        "multipart/report; report-type=disposition-notification",
        &[MimeEntity::from_content("text/plain", &b"no notification here"[..])],
    );

    let response = processor.respond(&request, &text_only).await;

    assert_eq!(response.status, 400);
    assert_eq!(response.body_text(), "No MDN entity found in request body");
}
