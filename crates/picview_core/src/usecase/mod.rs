//! Use cases composing the repositories, the store and the strategies.

mod browse;
mod classify;
mod view;

pub use browse::{BrowseFolderUseCase, FolderListing};
pub use classify::ClassifyImageUseCase;
pub use view::ViewImageUseCase;
