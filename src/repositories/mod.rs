pub mod article;
pub mod memory;
pub mod source;
pub mod user;

pub use article::{ArticleListing, ArticleRepository, ArticleRepositoryTrait};
pub use memory::MemoryStore;
pub use source::{NewSource, SourceRepository, SourceRepositoryTrait};
pub use user::{UserRepository, UserRepositoryTrait};

#[cfg(test)]
pub use article::MockArticleRepositoryTrait;
#[cfg(test)]
pub use source::MockSourceRepositoryTrait;
#[cfg(test)]
pub use user::MockUserRepositoryTrait;
