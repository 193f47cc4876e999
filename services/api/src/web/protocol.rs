//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol for live catalog search.

use bookrec_core::domain::Book;
use serde::{Deserialize, Serialize};

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

#[derive(Deserialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// The current contents of the search box, sent on every keystroke.
    Search { query: String },
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Results for the last query of a typing burst. Empty when the query is
    /// too short to search.
    SearchResults { query: String, books: Vec<Book> },

    /// The client sent something that is not a valid message.
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_format_is_tagged_snake_case() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"search","query":"dune"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Search { query: "dune".to_string() });

        let out = serde_json::to_value(ServerMessage::SearchResults {
            query: "x".to_string(),
            books: Vec::new(),
        })
        .unwrap();
        assert_eq!(out["type"], "search_results");
        assert_eq!(out["books"], serde_json::json!([]));
    }
}
