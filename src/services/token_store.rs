// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client-side token persistence.
//!
//! The store holds exactly two opaque strings under fixed keys. Every
//! component that reads or writes tokens receives the store explicitly.

use crate::error::{AppError, Result};
use crate::models::TokenPair;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Storage key for the access token.
pub const ACCESS_TOKEN_KEY: &str = "whoop_access_token";
/// Storage key for the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "whoop_refresh_token";

/// Persistence contract for the current token pair.
pub trait TokenStore: Send + Sync {
    /// Current pair, or `None` unless both tokens are present.
    fn load(&self) -> Result<Option<TokenPair>>;
    fn save(&self, tokens: &TokenPair) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// In-process token store.
#[derive(Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<Option<TokenPair>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(tokens: TokenPair) -> Self {
        Self {
            tokens: Mutex::new(Some(tokens)),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<TokenPair>> {
        Ok(self.lock()?.clone())
    }

    fn save(&self, tokens: &TokenPair) -> Result<()> {
        *self.lock()? = Some(tokens.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.lock()? = None;
        Ok(())
    }
}

impl MemoryTokenStore {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<TokenPair>>> {
        self.tokens
            .lock()
            .map_err(|_| AppError::TokenStore("token store mutex poisoned".to_string()))
    }
}

/// On-disk layout: one JSON object keyed by the two storage names.
#[derive(Serialize, Deserialize, Default)]
struct StoredTokens {
    #[serde(rename = "whoop_access_token", default)]
    access_token: Option<String>,
    #[serde(rename = "whoop_refresh_token", default)]
    refresh_token: Option<String>,
}

/// Token store backed by a JSON file (the CLI's equivalent of browser
/// local storage).
pub struct FileTokenStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    guard: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<StoredTokens> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StoredTokens::default())
            }
            Err(e) => return Err(AppError::TokenStore(e.to_string())),
        };

        serde_json::from_str(&raw).map_err(|e| {
            AppError::TokenStore(format!("{} is not valid JSON: {}", self.path.display(), e))
        })
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<TokenPair>> {
        let _guard = self.guard.lock().map_err(poisoned)?;
        let stored = self.read()?;

        Ok(match (stored.access_token, stored.refresh_token) {
            (Some(access), Some(refresh)) if !access.is_empty() && !refresh.is_empty() => {
                Some(TokenPair::new(access, refresh))
            }
            _ => None,
        })
    }

    fn save(&self, tokens: &TokenPair) -> Result<()> {
        let _guard = self.guard.lock().map_err(poisoned)?;
        let stored = StoredTokens {
            access_token: Some(tokens.access_token.clone()),
            refresh_token: Some(tokens.refresh_token.clone()),
        };
        let json = serde_json::to_string_pretty(&stored)
            .map_err(|e| AppError::TokenStore(e.to_string()))?;

        // Write then rename so a crash never leaves half a token file.
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json).map_err(|e| AppError::TokenStore(e.to_string()))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| AppError::TokenStore(e.to_string()))?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let _guard = self.guard.lock().map_err(poisoned)?;
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::TokenStore(e.to_string())),
        }
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> AppError {
    AppError::TokenStore("token store mutex poisoned".to_string())
}
