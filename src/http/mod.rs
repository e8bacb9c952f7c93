pub mod body;
pub mod request;
pub mod response;
pub mod status;

pub use body::{Body, BodyKind, BodyOptions, BodyStream, BodyValue, Encoding};
pub use request::Request;
pub use response::{Ended, Fresh, Headers, Open, Response, ResponseState, WithStatus};
pub use status::reason_phrase;
