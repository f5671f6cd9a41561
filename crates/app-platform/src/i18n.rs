//! Message lookup emulation
//!
//! Catalogs use the `_locales/<locale>/messages.json` format: message name to
//! `{ "message": ..., "description": ... }`. Locale codes are stored with
//! underscores (`en_US`), so `en-US` and `en_US` name the same catalog.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// One catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Text, with `$1`, `$2`, ... placeholders
    pub message: String,
    /// Translator note
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Messages of one locale, keyed by name
pub type Messages = HashMap<String, Message>;

/// English strings of the editor
const ENGLISH: &[(&str, &str)] = &[
    ("appDesc", "A text editor for the web."),
    ("fileMenuNew", "New"),
    ("fileMenuOpen", "Open"),
    ("fileMenuSave", "Save"),
    ("fileMenuSaveas", "Save as"),
    ("menuSettings", "Settings"),
    ("menuShortcuts", "Keyboard shortcuts"),
    ("fontsizeSetting", "Font size"),
    ("fontsizeTooltip", "Set with Ctrl- and Ctrl+"),
    ("spacestabSetting", "Tabs to spaces"),
    ("tabsizeSetting", "Tab size"),
    ("wraplinesSetting", "Wrap lines"),
    ("linenumbersSetting", "Show line numbers"),
    ("smartindentSetting", "Smart indent"),
    ("themeSetting", "Themes"),
    ("alwaysOnTopSetting", "Always on top"),
    ("deviceThemeOption", "Use device theme"),
    ("lightThemeOption", "Light"),
    ("darkThemeOption", "Dark"),
    ("helpSection", "Help"),
    ("closeSettings", "Back"),
    ("openSidebarButton", "Open sidebar"),
    ("closeSidebarButton", "Close sidebar"),
    ("searchPlaceholder", "Find..."),
    ("searchCounting", "$1 of $2"),
    ("searchNextButton", "Next"),
    ("searchPreviousButton", "Previous"),
    ("errorTitle", "Error"),
    ("loadingTitle", "Loading..."),
    ("minimizeButton", "Minimize"),
    ("maximizeButton", "Maximize"),
    ("restoreButton", "Restore"),
    ("closeButton", "Quit"),
    ("yesDialogButton", "Yes"),
    ("noDialogButton", "No"),
    ("cancelDialogButton", "Cancel"),
    ("saveFilePromptLine1", "$1 has been modified."),
    ("saveFilePromptLine2", "Do you want to save it before closing?"),
    ("okDialogButton", "OK"),
    ("closeFileButton", "Close file"),
];

/// Locales served by the built-in English catalog
const ENGLISH_LOCALES: &[&str] = &["en", "en_US", "en_GB"];

/// Normalize a locale code to the catalog form (`en-US` -> `en_US`)
pub fn normalize_locale(locale: &str) -> String {
    locale.replace('-', "_")
}

/// The built-in English messages
pub fn english_messages() -> Messages {
    ENGLISH
        .iter()
        .map(|(name, text)| {
            (name.to_string(), Message { message: text.to_string(), description: None })
        })
        .collect()
}

/// Per-locale message catalogs
#[derive(Debug)]
pub struct MessageCatalog {
    ui_language: String,
    default_locale: String,
    locales: RwLock<HashMap<String, Arc<Messages>>>,
}

impl MessageCatalog {
    /// Create an empty catalog
    pub fn new(ui_language: impl Into<String>, default_locale: impl Into<String>) -> Self {
        Self {
            ui_language: ui_language.into(),
            default_locale: normalize_locale(&default_locale.into()),
            locales: RwLock::new(HashMap::new()),
        }
    }

    /// Create a catalog preloaded with the English messages
    pub fn with_builtin(ui_language: impl Into<String>, default_locale: impl Into<String>) -> Self {
        let catalog = Self::new(ui_language, default_locale);
        let english = Arc::new(english_messages());
        {
            let mut locales = catalog.locales.write();
            for locale in ENGLISH_LOCALES {
                locales.insert(locale.to_string(), english.clone());
            }
        }
        catalog
    }

    /// UI language as configured, e.g. `en-US`
    pub fn ui_language(&self) -> &str {
        &self.ui_language
    }

    /// Install the messages of one locale, replacing any previous catalog
    pub fn insert_locale(&self, locale: &str, messages: Messages) {
        self.locales.write().insert(normalize_locale(locale), Arc::new(messages));
    }

    /// Parse a `messages.json` text and install it for `locale`
    ///
    /// Returns the number of messages loaded.
    pub fn load_locale(&self, locale: &str, json: &str) -> Result<usize, serde_json::Error> {
        let messages: Messages = serde_json::from_str(json)?;
        let count = messages.len();
        self.insert_locale(locale, messages);
        tracing::debug!(locale, count, "loaded message catalog");
        Ok(count)
    }

    /// Check whether a catalog exists for `locale`
    pub fn has_locale(&self, locale: &str) -> bool {
        self.locales.read().contains_key(&normalize_locale(locale))
    }

    /// Catalog used for `locale`: exact, then base language, then default
    pub fn messages_for(&self, locale: &str) -> Option<Arc<Messages>> {
        let locale = normalize_locale(locale);
        let locales = self.locales.read();

        if let Some(messages) = locales.get(&locale) {
            return Some(messages.clone());
        }

        if let Some((base, _)) = locale.split_once('_') {
            if let Some(messages) = locales.get(base) {
                return Some(messages.clone());
            }
        }

        locales.get(&self.default_locale).cloned()
    }

    /// Look up `name` in the UI language's catalog
    ///
    /// `$1`, `$2`, ... are replaced in order by `substitutions`, first
    /// occurrence only. A missing message yields `name` itself.
    pub fn get_message(&self, name: &str, substitutions: &[&str]) -> String {
        let Some(messages) = self.messages_for(&self.ui_language) else {
            return name.to_string();
        };
        let Some(entry) = messages.get(name) else {
            return name.to_string();
        };

        let mut text = entry.message.clone();
        for (index, substitution) in substitutions.iter().enumerate() {
            text = text.replacen(&format!("${}", index + 1), substitution, 1);
        }
        text
    }
}
