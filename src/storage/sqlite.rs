use super::{ProfileLabel, ReferenceProfileStore, SessionPersistence, TurnRecord};
use crate::error::CoachResult;
use crate::scoring::FeatureVector;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, warn};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at TEXT,
    child_id INTEGER,
    story_id TEXT,
    story_title TEXT,
    goal TEXT,
    sentence_index INTEGER,
    expected_text TEXT,
    recognized_text TEXT,
    wer REAL,
    audio_path TEXT,
    duration_sec REAL,
    phoneme_target TEXT,
    spectral_centroid_hz REAL,
    features_json TEXT,
    acoustic_score REAL,
    acoustic_contrast REAL,
    final_score REAL,
    phoneme_confidence REAL,
    focus_start_sec REAL,
    focus_end_sec REAL
);
CREATE TABLE IF NOT EXISTS reference_profiles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    child_id INTEGER,
    phoneme TEXT,
    label TEXT,
    features_json TEXT,
    created_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_reference_profiles_child_phoneme
    ON reference_profiles(child_id, phoneme);
CREATE INDEX IF NOT EXISTS idx_sessions_child_created
    ON sessions(child_id, created_at);
";

/// Turn history and reference profiles in one SQLite file.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    pub fn open(db_path: &Path) -> CoachResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        info!("🗄️ Opened store at {}", db_path.display());
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> CoachResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> CoachResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn save_reference_profile(
        &self,
        child_id: Option<i64>,
        phoneme: &str,
        label: ProfileLabel,
        features: &FeatureVector,
    ) -> CoachResult<i64> {
        let json = serde_json::to_string(features)?;
        let conn = self.conn.lock()?;
        conn.execute(
            "INSERT INTO reference_profiles (child_id, phoneme, label, features_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![child_id, phoneme, label.as_str(), json, now_iso()],
        )?;
        let id = conn.last_insert_rowid();
        info!(
            "💾 Saved {} profile for {} (child {:?}) as #{}",
            label.as_str(),
            phoneme,
            child_id,
            id
        );
        Ok(id)
    }

    fn query_profile(
        &self,
        child_id: Option<i64>,
        phoneme: &str,
        label: ProfileLabel,
    ) -> CoachResult<Option<FeatureVector>> {
        let conn = self.conn.lock()?;
        // `child_id = NULL` never matches, so the shared profile needs its own query
        let json: Option<String> = match child_id {
            Some(id) => conn
                .query_row(
                    "SELECT features_json FROM reference_profiles
                     WHERE child_id = ?1 AND phoneme = ?2 AND label = ?3
                     ORDER BY created_at DESC, id DESC LIMIT 1",
                    params![id, phoneme, label.as_str()],
                    |row| row.get(0),
                )
                .optional()?,
            None => conn
                .query_row(
                    "SELECT features_json FROM reference_profiles
                     WHERE child_id IS NULL AND phoneme = ?1 AND label = ?2
                     ORDER BY created_at DESC, id DESC LIMIT 1",
                    params![phoneme, label.as_str()],
                    |row| row.get(0),
                )
                .optional()?,
        };
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Most recent turns, newest first.
    pub fn recent_turns(&self, child_id: Option<i64>, limit: usize) -> CoachResult<Vec<TurnRecord>> {
        let conn = self.conn.lock()?;
        let mut stmt = conn.prepare(
            "SELECT created_at, child_id, story_id, story_title, goal, sentence_index,
                    expected_text, recognized_text, wer, audio_path, duration_sec,
                    phoneme_target, spectral_centroid_hz, features_json, acoustic_score,
                    acoustic_contrast, final_score, phoneme_confidence, focus_start_sec,
                    focus_end_sec
             FROM sessions
             WHERE ?1 IS NULL OR child_id = ?1
             ORDER BY created_at DESC, id DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![child_id, limit as i64], |row| {
            let features_json: Option<String> = row.get(13)?;
            Ok(TurnRecord {
                created_at: row.get(0)?,
                child_id: row.get(1)?,
                story_id: row.get(2)?,
                story_title: row.get(3)?,
                goal: row.get(4)?,
                sentence_index: row.get::<_, i64>(5)? as usize,
                expected_text: row.get(6)?,
                recognized_text: row.get(7)?,
                wer: row.get(8)?,
                audio_path: row.get(9)?,
                duration_sec: row.get(10)?,
                phoneme_target: row.get(11)?,
                spectral_centroid_hz: row.get(12)?,
                features: features_json.and_then(|j| serde_json::from_str(&j).ok()),
                acoustic_score: row.get(14)?,
                acoustic_contrast: row.get(15)?,
                final_score: row.get(16)?,
                phoneme_confidence: row.get(17)?,
                focus_start_sec: row.get(18)?,
                focus_end_sec: row.get(19)?,
            })
        })?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }
}

impl ReferenceProfileStore for SqliteStore {
    fn load(
        &self,
        child_id: Option<i64>,
        phoneme: &str,
        label: ProfileLabel,
    ) -> Option<FeatureVector> {
        match self.query_profile(child_id, phoneme, label) {
            Ok(profile) => profile,
            Err(e) => {
                warn!("⚠️ Failed to load reference profile {}/{}: {}", phoneme, label.as_str(), e);
                None
            }
        }
    }
}

impl SessionPersistence for SqliteStore {
    fn save_turn_outcome(&self, record: &TurnRecord) -> CoachResult<i64> {
        let features_json = record
            .features
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let conn = self.conn.lock()?;
        conn.execute(
            "INSERT INTO sessions (
                created_at, child_id, story_id, story_title, goal, sentence_index,
                expected_text, recognized_text, wer, audio_path, duration_sec,
                phoneme_target, spectral_centroid_hz, features_json, acoustic_score,
                acoustic_contrast, final_score, phoneme_confidence, focus_start_sec,
                focus_end_sec
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                       ?17, ?18, ?19, ?20)",
            params![
                record.created_at,
                record.child_id,
                record.story_id,
                record.story_title,
                record.goal,
                record.sentence_index as i64,
                record.expected_text,
                record.recognized_text,
                record.wer,
                record.audio_path,
                record.duration_sec,
                record.phoneme_target,
                record.spectral_centroid_hz,
                features_json,
                record.acoustic_score,
                record.acoustic_contrast,
                record.final_score,
                record.phoneme_confidence,
                record.focus_start_sec,
                record.focus_end_sec,
            ],
        )?;
        let id = conn.last_insert_rowid();
        debug!("💾 Saved turn #{} ({:.2})", id, record.final_score);
        Ok(id)
    }
}

pub fn now_iso() -> String {
    chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
}
