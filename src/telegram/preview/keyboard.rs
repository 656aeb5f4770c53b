use teloxide::types::InlineKeyboardMarkup;

use crate::core::config;
use crate::download::models::MediaKind;
use crate::telegram::cb;
use crate::telegram::preview::formats::FormatOption;

/// Which entry of the format menu was picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatChoice {
    Index(usize),
    Best,
}

/// Parsed inline button payload.
///
/// Wire forms: `kind:<link>:<v|a>`, `dl:<link>:<v|a>:<index|best>`, `plres:<height>`.
/// `<link>` is the link cache key, which keeps every payload under 64 bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    Kind {
        link: String,
        kind: MediaKind,
    },
    Download {
        link: String,
        kind: MediaKind,
        choice: FormatChoice,
    },
    PlaylistResolution {
        height: u32,
    },
}

impl CallbackAction {
    pub fn parse(data: &str) -> Option<Self> {
        let parts: Vec<&str> = data.split(':').collect();
        match parts.as_slice() {
            ["kind", link, kind] => Some(Self::Kind {
                link: link.to_string(),
                kind: MediaKind::from_code(kind)?,
            }),
            ["dl", link, kind, choice] => {
                let choice = match *choice {
                    "best" => FormatChoice::Best,
                    index => FormatChoice::Index(index.parse().ok()?),
                };
                Some(Self::Download {
                    link: link.to_string(),
                    kind: MediaKind::from_code(kind)?,
                    choice,
                })
            }
            ["plres", height] => Some(Self::PlaylistResolution {
                height: height.parse().ok()?,
            }),
            _ => None,
        }
    }

    pub fn encode(&self) -> String {
        match self {
            Self::Kind { link, kind } => format!("kind:{}:{}", link, kind.code()),
            Self::Download { link, kind, choice } => {
                let choice = match choice {
                    FormatChoice::Best => "best".to_string(),
                    FormatChoice::Index(index) => index.to_string(),
                };
                format!("dl:{}:{}:{}", link, kind.code(), choice)
            }
            Self::PlaylistResolution { height } => format!("plres:{}", height),
        }
    }
}

/// "Video or audio?" keyboard for a cached link.
pub fn kind_keyboard(link: &str) -> InlineKeyboardMarkup {
    let button = |text: &str, kind| {
        cb(
            text.to_string(),
            CallbackAction::Kind {
                link: link.to_string(),
                kind,
            }
            .encode(),
        )
    };
    InlineKeyboardMarkup::new(vec![vec![
        button("🎥 Video", MediaKind::Video),
        button("🎧 Audio", MediaKind::Audio),
    ]])
}

/// One button per option, followed by "⭐ Best".
pub fn format_keyboard(link: &str, kind: MediaKind, options: &[FormatOption]) -> InlineKeyboardMarkup {
    let download = |choice| {
        CallbackAction::Download {
            link: link.to_string(),
            kind,
            choice,
        }
        .encode()
    };

    let mut rows: Vec<_> = options
        .iter()
        .enumerate()
        .map(|(index, option)| vec![cb(option.label.clone(), download(FormatChoice::Index(index)))])
        .collect();
    rows.push(vec![cb("⭐ Best".to_string(), download(FormatChoice::Best))]);

    InlineKeyboardMarkup::new(rows)
}

/// Playlist resolution picker, three buttons per row.
pub fn resolution_keyboard() -> InlineKeyboardMarkup {
    let rows = config::playlist::RESOLUTIONS
        .chunks(3)
        .map(|chunk| {
            chunk
                .iter()
                .map(|height| {
                    cb(
                        format!("{}p", height),
                        CallbackAction::PlaylistResolution { height: *height }.encode(),
                    )
                })
                .collect()
        })
        .collect::<Vec<Vec<_>>>();
    InlineKeyboardMarkup::new(rows)
}
