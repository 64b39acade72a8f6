//! Preference store bridge.
//!
//! Every persisted field is written back to the server through a partial
//! [`SettingsPatch`]. Fields fall into three groups:
//!
//! - guarded fields write as soon as the value changes, but never for the
//!   value they were initialized with
//! - column widths are clamped, then written once after a quiet period
//! - AI settings are written by their explicit update calls
//!
//! Nothing here performs I/O. Callers turn the returned patches into effects.

use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tokio::time::Instant;

use crate::api::{Scope, Settings, SettingsPatch, StatusFilter};
use crate::util::Debounced;

pub const MIN_COLUMN_WIDTH: u32 = 200;
pub const MAX_COLUMN_WIDTH: u32 = 700;
pub const DEFAULT_COLUMN_WIDTH: u32 = 300;

const DEFAULT_AI_URL: &str = "https://api.aimlapi.com/v1/chat/completions";
const DEFAULT_AI_MODEL: &str = "gpt-4o-mini";
const DEFAULT_AI_PROMPT: &str = "Please provide a concise summary (TL;DR) of the following article. \
Keep summaries between 2-4 sentences, highlighting the key points and important details:";
const DEFAULT_AI_PERSONALITY: &str =
    "You are a helpful, knowledgeable assistant that provides clear and concise responses.";
const DEFAULT_AI_EXPLAIN_PROMPT: &str =
    "Please explain this text in a clear and easy-to-understand way:";
const DEFAULT_AI_SUMMARIZE_PROMPT: &str = "Please provide a concise summary of this text:";

// ============================================================================
// Tracked fields
// ============================================================================

/// A preference value that only starts producing writes once it has been
/// initialized from the server.
#[derive(Debug, Clone, PartialEq)]
pub enum Tracked<T> {
    Uninitialized,
    Initialized(T),
}

/// Outcome of [`Tracked::set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// First value; no write.
    Initialized,
    /// Value differs from the previous one; write.
    Changed,
    Unchanged,
}

impl<T: PartialEq> Tracked<T> {
    pub fn get(&self) -> Option<&T> {
        match self {
            Tracked::Uninitialized => None,
            Tracked::Initialized(v) => Some(v),
        }
    }

    pub fn initialize(&mut self, value: T) {
        *self = Tracked::Initialized(value);
    }

    pub fn set(&mut self, value: T) -> Change {
        match self {
            Tracked::Uninitialized => {
                *self = Tracked::Initialized(value);
                Change::Initialized
            }
            Tracked::Initialized(current) if *current == value => Change::Unchanged,
            Tracked::Initialized(current) => {
                *current = value;
                Change::Changed
            }
        }
    }
}

impl<T> Default for Tracked<T> {
    fn default() -> Self {
        Tracked::Uninitialized
    }
}

// ============================================================================
// Theme
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Theme {
    pub name: String,
    pub font: String,
    pub size: f64,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            name: "light".to_string(),
            font: String::new(),
            size: 1.0,
        }
    }
}

impl Theme {
    /// Step the font size by `steps` tenths, rounded to one decimal.
    pub fn incr_font(&self, steps: i32) -> Theme {
        let size = ((self.size + 0.1 * f64::from(steps)) * 10.0).round() / 10.0;
        Theme {
            size,
            ..self.clone()
        }
    }
}

// ============================================================================
// Column widths
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    FeedList,
    ItemList,
}

pub fn clamp_width(width: u32) -> u32 {
    width.clamp(MIN_COLUMN_WIDTH, MAX_COLUMN_WIDTH)
}

#[derive(Debug)]
struct Width {
    value: u32,
    write: Debounced<u32>,
}

impl Width {
    fn new(quiet: Duration) -> Self {
        Self {
            value: DEFAULT_COLUMN_WIDTH,
            write: Debounced::new(quiet),
        }
    }
}

// ============================================================================
// AI settings
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiField {
    ApiKey,
    ApiUrl,
    Model,
    Prompt,
    Personality,
    ExplainPrompt,
    SummarizePrompt,
}

/// Settings consumed by the AI collaborators. The key never shows in `Debug`.
#[derive(Debug)]
pub struct AiSettings {
    pub api_key: SecretString,
    pub api_url: String,
    pub model: String,
    pub prompt: String,
    pub personality: String,
    pub explain_prompt: String,
    pub summarize_prompt: String,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            api_key: SecretString::from(String::new()),
            api_url: DEFAULT_AI_URL.to_string(),
            model: DEFAULT_AI_MODEL.to_string(),
            prompt: DEFAULT_AI_PROMPT.to_string(),
            personality: DEFAULT_AI_PERSONALITY.to_string(),
            explain_prompt: DEFAULT_AI_EXPLAIN_PROMPT.to_string(),
            summarize_prompt: DEFAULT_AI_SUMMARIZE_PROMPT.to_string(),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_deref().filter(|s| !s.is_empty()).map(str::to_string)
}

impl AiSettings {
    /// Server values, with empty or missing ones replaced by defaults.
    fn from_settings(s: &Settings) -> Self {
        let defaults = Self::default();
        Self {
            api_key: SecretString::from(s.ai_api_key.clone().unwrap_or_default()),
            api_url: non_empty(&s.ai_api_url).unwrap_or(defaults.api_url),
            model: non_empty(&s.ai_model).unwrap_or(defaults.model),
            prompt: non_empty(&s.ai_prompt).unwrap_or(defaults.prompt),
            personality: non_empty(&s.ai_personality).unwrap_or(defaults.personality),
            explain_prompt: non_empty(&s.ai_explain_prompt).unwrap_or(defaults.explain_prompt),
            summarize_prompt: non_empty(&s.ai_summarize_prompt)
                .unwrap_or(defaults.summarize_prompt),
        }
    }

    pub fn has_key(&self) -> bool {
        !self.api_key.expose_secret().is_empty()
    }
}

// ============================================================================
// Preferences
// ============================================================================

#[derive(Debug)]
pub struct Preferences {
    filter: Tracked<Option<StatusFilter>>,
    scope: Tracked<Option<Scope>>,
    sort_newest_first: Tracked<bool>,
    sidebar_collapsed: Tracked<bool>,
    refresh_rate: Tracked<Option<u32>>,
    theme: Tracked<Theme>,
    feed_list_width: Width,
    item_list_width: Width,
    pub ai: AiSettings,
}

impl Preferences {
    pub fn new(width_debounce: Duration) -> Self {
        Self {
            filter: Tracked::Uninitialized,
            scope: Tracked::Uninitialized,
            sort_newest_first: Tracked::Uninitialized,
            sidebar_collapsed: Tracked::Uninitialized,
            refresh_rate: Tracked::Uninitialized,
            theme: Tracked::Uninitialized,
            feed_list_width: Width::new(width_debounce),
            item_list_width: Width::new(width_debounce),
            ai: AiSettings::default(),
        }
    }

    /// Seed every field from the persisted set. Never produces a write.
    pub fn initialize_from(&mut self, settings: &Settings) {
        self.filter.initialize(settings.filter);
        self.scope.initialize(settings.feed);
        self.sort_newest_first
            .initialize(settings.sort_newest_first.unwrap_or(true));
        self.sidebar_collapsed
            .initialize(settings.sidebar_collapsed.unwrap_or(false));
        self.refresh_rate.initialize(settings.refresh_rate);

        let defaults = Theme::default();
        self.theme.initialize(Theme {
            name: settings.theme_name.clone().unwrap_or(defaults.name),
            font: settings.theme_font.clone().unwrap_or(defaults.font),
            size: settings.theme_size.unwrap_or(defaults.size),
        });

        self.feed_list_width.value = settings
            .feed_list_width
            .map_or(DEFAULT_COLUMN_WIDTH, clamp_width);
        self.item_list_width.value = settings
            .item_list_width
            .map_or(DEFAULT_COLUMN_WIDTH, clamp_width);
        self.ai = AiSettings::from_settings(settings);
    }

    // ----- getters -----

    pub fn filter(&self) -> Option<StatusFilter> {
        self.filter.get().copied().flatten()
    }

    pub fn scope(&self) -> Option<Scope> {
        self.scope.get().copied().flatten()
    }

    pub fn sort_newest_first(&self) -> bool {
        self.sort_newest_first.get().copied().unwrap_or(true)
    }

    pub fn sidebar_collapsed(&self) -> bool {
        self.sidebar_collapsed.get().copied().unwrap_or(false)
    }

    pub fn refresh_rate(&self) -> Option<u32> {
        self.refresh_rate.get().copied().flatten()
    }

    pub fn theme(&self) -> Theme {
        self.theme.get().cloned().unwrap_or_default()
    }

    pub fn width(&self, column: Column) -> u32 {
        self.column(column).value
    }

    // ----- guarded setters -----
    //
    // Each returns the patch to write, or `None` when the value was only
    // initialized or did not change.

    pub fn set_filter(&mut self, filter: Option<StatusFilter>) -> Option<SettingsPatch> {
        (self.filter.set(filter) == Change::Changed).then(|| SettingsPatch {
            filter: Some(filter),
            ..Default::default()
        })
    }

    pub fn set_scope(&mut self, scope: Option<Scope>) -> Option<SettingsPatch> {
        (self.scope.set(scope) == Change::Changed).then(|| SettingsPatch {
            feed: Some(scope),
            ..Default::default()
        })
    }

    pub fn set_sort_newest_first(&mut self, newest_first: bool) -> Option<SettingsPatch> {
        (self.sort_newest_first.set(newest_first) == Change::Changed).then(|| SettingsPatch {
            sort_newest_first: Some(newest_first),
            ..Default::default()
        })
    }

    pub fn set_sidebar_collapsed(&mut self, collapsed: bool) -> Option<SettingsPatch> {
        (self.sidebar_collapsed.set(collapsed) == Change::Changed).then(|| SettingsPatch {
            sidebar_collapsed: Some(collapsed),
            ..Default::default()
        })
    }

    pub fn set_refresh_rate(&mut self, rate: Option<u32>) -> Option<SettingsPatch> {
        (self.refresh_rate.set(rate) == Change::Changed).then(|| SettingsPatch {
            refresh_rate: Some(rate),
            ..Default::default()
        })
    }

    /// The theme is written as one unit whenever any part of it changes.
    pub fn set_theme(&mut self, theme: Theme) -> Option<SettingsPatch> {
        let patch = SettingsPatch {
            theme_name: Some(theme.name.clone()),
            theme_font: Some(theme.font.clone()),
            theme_size: Some(theme.size),
            ..Default::default()
        };
        (self.theme.set(theme) == Change::Changed).then_some(patch)
    }

    pub fn incr_font(&mut self, steps: i32) -> Option<SettingsPatch> {
        let theme = self.theme().incr_font(steps);
        self.set_theme(theme)
    }

    // ----- debounced widths -----

    fn column(&self, column: Column) -> &Width {
        match column {
            Column::FeedList => &self.feed_list_width,
            Column::ItemList => &self.item_list_width,
        }
    }

    fn column_mut(&mut self, column: Column) -> &mut Width {
        match column {
            Column::FeedList => &mut self.feed_list_width,
            Column::ItemList => &mut self.item_list_width,
        }
    }

    /// Record a drag-resize. The local width applies at once; the write is
    /// issued by [`poll_due`](Self::poll_due) after the quiet period.
    pub fn resize(&mut self, column: Column, width: u32, now: Instant) -> u32 {
        let width = clamp_width(width);
        let slot = self.column_mut(column);
        slot.value = width;
        slot.write.trigger(width, now);
        width
    }

    /// Width writes whose quiet period has elapsed.
    pub fn poll_due(&mut self, now: Instant) -> Vec<SettingsPatch> {
        let mut patches = Vec::new();
        if let Some(width) = self.feed_list_width.write.poll(now) {
            patches.push(SettingsPatch {
                feed_list_width: Some(width),
                ..Default::default()
            });
        }
        if let Some(width) = self.item_list_width.write.poll(now) {
            patches.push(SettingsPatch {
                item_list_width: Some(width),
                ..Default::default()
            });
        }
        patches
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        [
            self.feed_list_width.write.deadline(),
            self.item_list_width.write.deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    // ----- explicit AI settings -----

    pub fn update_ai(&mut self, field: AiField, value: String) -> SettingsPatch {
        let mut patch = SettingsPatch::default();
        match field {
            AiField::ApiKey => {
                patch.ai_api_key = Some(value.clone());
                self.ai.api_key = SecretString::from(value);
            }
            AiField::ApiUrl => {
                patch.ai_api_url = Some(value.clone());
                self.ai.api_url = value;
            }
            AiField::Model => {
                patch.ai_model = Some(value.clone());
                self.ai.model = value;
            }
            AiField::Prompt => {
                patch.ai_prompt = Some(value.clone());
                self.ai.prompt = value;
            }
            AiField::Personality => {
                patch.ai_personality = Some(value.clone());
                self.ai.personality = value;
            }
            AiField::ExplainPrompt => {
                patch.ai_explain_prompt = Some(value.clone());
                self.ai.explain_prompt = value;
            }
            AiField::SummarizePrompt => {
                patch.ai_summarize_prompt = Some(value.clone());
                self.ai.summarize_prompt = value;
            }
        }
        patch
    }
}
