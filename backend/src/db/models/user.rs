use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    /// Spotify account id of the participant.
    pub user_id: String,
    pub email: String,

    // Latest song submission; all three stay NULL until the user picks a song
    pub last_song_uri: Option<String>,
    pub last_song_title: Option<String>,
    pub last_song_artist: Option<String>,
}

/// A submitted `(title, artist)` pair as read for the poll.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct SongChoice {
    pub title: Option<String>,
    pub artist: Option<String>,
}

impl SongChoice {
    pub fn is_complete(&self) -> bool {
        let filled = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        filled(&self.title) && filled(&self.artist)
    }

    /// Poll option label in the `artist - title` form.
    pub fn label(&self) -> String {
        format!(
            "{} - {}",
            self.artist.as_deref().unwrap_or_default(),
            self.title.as_deref().unwrap_or_default()
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct SongSubmission {
    pub uri: Option<String>,
    pub title: Option<String>,
    pub artist: Option<String>,
}
