pub mod codes;
pub mod requests;
pub mod responses;
pub mod result;

pub use result::{
    ApiResult, Cause, ErrorDetails, ResultError, decode_body, if_error,
    if_success, is_error, is_error_body, is_success, make_error,
};
