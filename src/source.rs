//! Candidate input seam.
//!
//! The reconciliation engine consumes an ordered sequence of candidates; where
//! they come from (page scraping, PDF extraction, the AI structuring call) is
//! upstream's business. `RateLimited` gates every upstream fetch through the
//! batch's rate limiter.

use std::fs;
use std::path::PathBuf;

use crate::limiter::RateLimiter;
use crate::model::{CandidateOffer, SourceError};

pub trait CandidateSource {
    fn fetch(&mut self) -> Result<Vec<CandidateOffer>, SourceError>;
}

/// Reads one batch of candidates from the extraction stage's JSON output
/// (an array of candidate records). Subsequent fetches return an empty batch.
pub struct JsonFileSource {
    path: PathBuf,
    drained: bool,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            drained: false,
        }
    }
}

impl CandidateSource for JsonFileSource {
    fn fetch(&mut self) -> Result<Vec<CandidateOffer>, SourceError> {
        if self.drained {
            return Ok(Vec::new());
        }
        self.drained = true;
        let content = fs::read_to_string(&self.path)?;
        let candidates: Vec<CandidateOffer> = serde_json::from_str(&content)?;
        Ok(candidates)
    }
}

/// Wraps a source so every upstream call first passes the rate limiter.
pub struct RateLimited<S> {
    inner: S,
    limiter: RateLimiter,
}

impl<S: CandidateSource> RateLimited<S> {
    pub fn new(inner: S, limiter: RateLimiter) -> Self {
        Self { inner, limiter }
    }
}

impl<S: CandidateSource> CandidateSource for RateLimited<S> {
    fn fetch(&mut self) -> Result<Vec<CandidateOffer>, SourceError> {
        self.limiter.check_and_wait();
        self.inner.fetch()
    }
}
