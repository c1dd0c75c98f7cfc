//! Process exit codes. Values follow curl where curl has an equivalent.

use apicall_core::ApiError;

pub const OK: u8 = 0;
pub const INVALID_ARGS: u8 = 1;
pub const FAILED_TO_INIT: u8 = 1;
pub const FAILED_TO_CONNECT: u8 = 7;
pub const INVALID_RESPONSE: u8 = 22;
pub const TRANSPORT_FAILURE: u8 = 56;
pub const ERROR_RESPONSE: u8 = 254;
pub const RENDER_FAILURE: u8 = 255;

pub fn for_error(err: &ApiError) -> u8 {
    match err {
        ApiError::InvalidArgument(_) => INVALID_ARGS,
        ApiError::Connectivity { .. } => FAILED_TO_CONNECT,
        ApiError::Transport { .. } => TRANSPORT_FAILURE,
        ApiError::InvalidResponse { .. } => INVALID_RESPONSE,
        ApiError::ErrorResponse { .. } => ERROR_RESPONSE,
        ApiError::Serialization(_) => FAILED_TO_INIT,
        ApiError::Render(_) => RENDER_FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;

    #[test]
    fn every_error_class_has_its_own_code() {
        assert_eq!(for_error(&ApiError::InvalidArgument("q".into())), 1);
        assert_eq!(for_error(&ApiError::Connectivity { attempted: vec![] }), 7);
        assert_eq!(
            for_error(&ApiError::InvalidResponse {
                reason: "html".into(),
                raw: vec![],
            }),
            22
        );
        assert_eq!(
            for_error(&ApiError::Transport {
                url: "http://x".into(),
                message: "reset".into(),
            }),
            56
        );
        assert_eq!(
            for_error(&ApiError::ErrorResponse {
                code: -32601,
                message: "not found".into(),
                data: None,
                response: Value::Null,
            }),
            254
        );
        assert_eq!(
            for_error(&ApiError::Render(std::io::ErrorKind::BrokenPipe.into())),
            255
        );
    }
}
