pub mod avatar;
pub mod user_dto;
pub mod user_handlers;
pub mod user_models;
pub mod user_repository;
pub mod user_service;

pub use avatar::{AvatarResolver, CdnAvatarResolver};
pub use user_dto::{SearchUsersQuery, UserSearchResult};
pub use user_handlers::search_users;
pub use user_models::{PublicProfile, User};
pub use user_repository::{UserDirectory, UserRepository};
pub use user_service::UserService;
