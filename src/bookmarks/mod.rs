pub mod commands;
pub mod practice;
pub mod store;

pub use practice::{grade_practice, practice_questions, practice_setup, PracticeResult};
pub use store::{
    add_bookmark, attach_solution, bookmark_subjects, bookmarks_by_ids, list_bookmarks, load_bookmarks,
    remove_bookmark, Bookmark, BookmarkFilter,
};
