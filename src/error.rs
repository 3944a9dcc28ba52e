use thiserror::Error;

pub type Result<T> = std::result::Result<T, TallyError>;

#[derive(Error, Debug)]
pub enum TallyError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Invalid date: {0}")]
    InvalidDate(String),
    #[error("Git discover error: {0}")]
    GitDiscover(#[from] Box<gix::discover::Error>),
    #[error("Reference find error: {0}")]
    RefFind(#[from] Box<gix::reference::find::existing::Error>),
    #[error("Head peel error: {0}")]
    HeadPeel(#[from] Box<gix::head::peel::to_commit::Error>),
    #[error("Object find error: {0}")]
    ObjectFind(#[from] Box<gix::object::find::existing::Error>),
    #[error("Object find with conversion error: {0}")]
    ObjectFindConv(#[from] Box<gix::object::find::existing::with_conversion::Error>),
    #[error("Commit error: {0}")]
    Commit(#[from] Box<gix::object::commit::Error>),
    #[error("Diff tree to tree error: {0}")]
    DiffTreeToTree(#[from] Box<gix::repository::diff_tree_to_tree::Error>),
    #[error("Object decode error: {0}")]
    ObjectDecode(#[from] Box<gix::objs::decode::Error>),
}

// Manual From implementations for unboxed to boxed conversions
impl From<gix::discover::Error> for TallyError {
    fn from(err: gix::discover::Error) -> Self {
        TallyError::GitDiscover(Box::new(err))
    }
}

impl From<gix::reference::find::existing::Error> for TallyError {
    fn from(err: gix::reference::find::existing::Error) -> Self {
        TallyError::RefFind(Box::new(err))
    }
}

impl From<gix::head::peel::to_commit::Error> for TallyError {
    fn from(err: gix::head::peel::to_commit::Error) -> Self {
        TallyError::HeadPeel(Box::new(err))
    }
}

impl From<gix::object::find::existing::Error> for TallyError {
    fn from(err: gix::object::find::existing::Error) -> Self {
        TallyError::ObjectFind(Box::new(err))
    }
}

impl From<gix::object::find::existing::with_conversion::Error> for TallyError {
    fn from(err: gix::object::find::existing::with_conversion::Error) -> Self {
        TallyError::ObjectFindConv(Box::new(err))
    }
}

impl From<gix::object::commit::Error> for TallyError {
    fn from(err: gix::object::commit::Error) -> Self {
        TallyError::Commit(Box::new(err))
    }
}

impl From<gix::repository::diff_tree_to_tree::Error> for TallyError {
    fn from(err: gix::repository::diff_tree_to_tree::Error) -> Self {
        TallyError::DiffTreeToTree(Box::new(err))
    }
}

impl From<gix::objs::decode::Error> for TallyError {
    fn from(err: gix::objs::decode::Error) -> Self {
        TallyError::ObjectDecode(Box::new(err))
    }
}
