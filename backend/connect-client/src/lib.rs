//! Client side of the photo-sharing API
//!
//! - [`ApiClient`]: typed HTTP client, one method per endpoint
//! - [`FeedPager`]: infinite-scroll paging over the feed or explore stream
//! - [`Mutation`]: per-action request state (idle, pending, success, error)
//! - [`Notice`]: user-facing text for the outcome of an action

pub mod client;
pub mod dto;
pub mod error;
pub mod mutation;
pub mod notice;
pub mod pager;

pub use client::{ApiClient, ExploreFeed, HomeFeed};
pub use dto::*;
pub use error::{ClientError, Result};
pub use mutation::{AlreadyPending, Mutation, MutationState};
pub use notice::{check_avatar, check_post_image, Action, Notice, NoticeKind};
pub use pager::{FeedPager, LoadTicket, PageSource};
