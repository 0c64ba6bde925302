//! Presentation state without widgets.
//!
//! Each view model owns an [`EventBus`](crate::events::EventBus) and reports
//! every state change on it. Use-case errors become [`Event::Error`]
//! notifications carrying the display message.
//!
//! [`Event::Error`]: crate::events::Event::Error

mod classification;
mod image_view;
mod main_window;

pub use classification::ClassificationViewModel;
pub use image_view::ImageViewModel;
pub use main_window::MainWindowViewModel;
