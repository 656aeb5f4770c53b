mod formats;
mod keyboard;

pub use formats::{best_selector, present_formats, AudioPairing, FormatOption};
pub use keyboard::{format_keyboard, kind_keyboard, resolution_keyboard, CallbackAction, FormatChoice};
