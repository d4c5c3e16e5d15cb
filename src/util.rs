//! Utility functions and helper types.

use std::any::Any;
use std::panic::Location;

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Location of the user code that called into the crate.
#[track_caller]
pub(crate) fn caller() -> &'static Location<'static> {
    Location::caller()
}
