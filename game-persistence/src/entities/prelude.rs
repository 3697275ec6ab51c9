pub use super::documents::Entity as Documents;
pub use super::documents::Model as Document;
