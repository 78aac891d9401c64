pub mod attachments;
pub mod decoders;
pub mod mbox;
pub mod outbound;
