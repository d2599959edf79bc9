//! Block report and background messages
//!
//! The content side reports its block candidates to the background with a
//! tagged message. An empty cycle reports the literal `"Nothing to block"`
//! instead of sending anything.

use serde::{Deserialize, Serialize, Serializer};

use crate::processor::NavigationContext;
use crate::types::BlockUrl;

pub const MSG_GET_HEURISTICS_DATABASE: &str = "MSG_GET_HEURISTICS_DATABASE";
pub const MSG_GET_HEURISTICS_URLS_TO_BLOCK: &str = "MSG_GET_HEURISTICS_URLS_TO_BLOCK";

pub const NOTHING_TO_BLOCK: &str = "Nothing to block";

/// Messages exchanged with the extension background.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HeuristicsMessage {
    #[serde(rename = "MSG_GET_HEURISTICS_DATABASE")]
    GetDatabase,
    #[serde(rename = "MSG_GET_HEURISTICS_URLS_TO_BLOCK", rename_all = "camelCase")]
    UrlsToBlock { heuristics_urls_to_block_array: Vec<BlockUrl> },
}

impl HeuristicsMessage {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::GetDatabase => MSG_GET_HEURISTICS_DATABASE,
            Self::UrlsToBlock { .. } => MSG_GET_HEURISTICS_URLS_TO_BLOCK,
        }
    }
}

/// Block candidates of one navigation, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReport {
    Urls(Vec<BlockUrl>),
    NothingToBlock,
}

impl BlockReport {
    pub fn from_urls(urls: Vec<BlockUrl>) -> Self {
        if urls.is_empty() {
            Self::NothingToBlock
        } else {
            Self::Urls(urls)
        }
    }

    pub fn from_context<N: Clone + PartialEq>(ctx: &NavigationContext<N>) -> Self {
        Self::from_urls(ctx.urls_to_block().cloned().collect())
    }

    pub fn urls(&self) -> &[BlockUrl] {
        match self {
            Self::Urls(urls) => urls,
            Self::NothingToBlock => &[],
        }
    }

    /// Message to send to the background, if there is anything to send.
    pub fn message(&self) -> Option<HeuristicsMessage> {
        match self {
            Self::Urls(urls) => Some(HeuristicsMessage::UrlsToBlock {
                heuristics_urls_to_block_array: urls.clone(),
            }),
            Self::NothingToBlock => None,
        }
    }
}

impl Serialize for BlockReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Urls(urls) => urls.serialize(serializer),
            Self::NothingToBlock => serializer.serialize_str(NOTHING_TO_BLOCK),
        }
    }
}
