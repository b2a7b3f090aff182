use std::borrow::Cow;

use elf_core::control::ControlError;
use rmcp::ErrorData;
use rmcp::model::ErrorCode;

pub fn mcp_err(code: ErrorCode, message: impl Into<Cow<'static, str>>) -> ErrorData {
    ErrorData {
        code,
        message: message.into(),
        data: None,
    }
}

pub fn map_control_err(err: ControlError) -> ErrorData {
    match err {
        ControlError::Validation(err) => mcp_err(ErrorCode::INVALID_PARAMS, err.to_string()),
        ControlError::Dispatch(err) => mcp_err(ErrorCode::INTERNAL_ERROR, err.to_string()),
    }
}
