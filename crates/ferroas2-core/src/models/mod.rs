pub mod mdn;
pub mod message;
pub mod partner;
pub mod watch;

pub use mdn::{
    IncomingAsyncMdn, IncomingSyncMdn, MdnAttributes, MdnReceiveStatus, PendingMdnInfoFile,
    ReplyMdn,
};
pub use message::{
    ConnectionInfo, IncomingFileMessage, IncomingMessage, MdnMode, OutgoingFileMessage,
    PendingInfo,
};
pub use partner::{CompanyRecord, PartnerDirectory, PartnerRecord, SendSettings};
pub use watch::{WatchStatus, WatchedDir, WatchedFile};
