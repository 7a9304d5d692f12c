use crate::error::LedgerError;
use crate::ledger::document::DateKey;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const BOOKING_DATE_FORMAT: &str = "%Y-%m-%d";

/// One questionnaire response as emitted by the survey scraper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRecord {
    pub seq: u64,
    pub rid: String,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Question {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub answer: String,
    /// Base64 body of the file-preview request, present on upload questions
    /// whose file was captured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base64: Option<String>,
}

/// Position of each logical field in [`BookingRecord::questions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Contact,
    BookingDate,
    PublishTiming,
    VideoLink,
    Description,
    ShortTitle,
    CoverDisplayMode,
    PortraitCoverSource,
    PortraitCoverUpload,
    PortraitCoverCrop,
    LandscapeCoverSource,
    LandscapeCoverUpload,
    LandscapeCoverCrop,
    Collection,
    UnitApproval,
    GroupApproval,
    LinkedArticle,
}

impl Field {
    pub const ALL: [Field; 17] = [
        Field::Contact,
        Field::BookingDate,
        Field::PublishTiming,
        Field::VideoLink,
        Field::Description,
        Field::ShortTitle,
        Field::CoverDisplayMode,
        Field::PortraitCoverSource,
        Field::PortraitCoverUpload,
        Field::PortraitCoverCrop,
        Field::LandscapeCoverSource,
        Field::LandscapeCoverUpload,
        Field::LandscapeCoverCrop,
        Field::Collection,
        Field::UnitApproval,
        Field::GroupApproval,
        Field::LinkedArticle,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// An uploaded file question: the answer is the file name, the payload the
/// captured preview body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Upload {
    pub file_name: String,
    pub payload_base64: Option<String>,
}

/// Named view over the fixed question positions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingFields {
    pub contact: String,
    pub booking_date: String,
    pub publish_timing: String,
    pub video_link: String,
    pub description: String,
    pub short_title: String,
    pub cover_display_mode: String,
    pub portrait_cover_source: String,
    pub portrait_cover_upload: Upload,
    pub portrait_cover_crop: String,
    pub landscape_cover_source: String,
    pub landscape_cover_upload: Upload,
    pub landscape_cover_crop: String,
    pub collection: String,
    pub unit_approval: String,
    pub group_approval: String,
    pub linked_article: String,
}

impl BookingRecord {
    fn answer(&self, field: Field) -> String {
        self.questions
            .get(field.index())
            .map(|q| q.answer.clone())
            .unwrap_or_default()
    }

    fn upload(&self, field: Field) -> Upload {
        let question = self.questions.get(field.index());
        Upload {
            file_name: question.map(|q| q.answer.clone()).unwrap_or_default(),
            payload_base64: question
                .and_then(|q| q.base64.clone())
                .filter(|b| !b.trim().is_empty()),
        }
    }

    pub fn fields(&self) -> Result<BookingFields> {
        if self.questions.len() < Field::ALL.len() {
            return Err(LedgerError::InvalidRecord(format!(
                "record {} has {} questions, expected {}",
                self.seq,
                self.questions.len(),
                Field::ALL.len()
            ))
            .into());
        }

        Ok(BookingFields {
            contact: self.answer(Field::Contact),
            booking_date: self.answer(Field::BookingDate),
            publish_timing: self.answer(Field::PublishTiming),
            video_link: self.answer(Field::VideoLink),
            description: self.answer(Field::Description),
            short_title: self.answer(Field::ShortTitle),
            cover_display_mode: self.answer(Field::CoverDisplayMode),
            portrait_cover_source: self.answer(Field::PortraitCoverSource),
            portrait_cover_upload: self.upload(Field::PortraitCoverUpload),
            portrait_cover_crop: self.answer(Field::PortraitCoverCrop),
            landscape_cover_source: self.answer(Field::LandscapeCoverSource),
            landscape_cover_upload: self.upload(Field::LandscapeCoverUpload),
            landscape_cover_crop: self.answer(Field::LandscapeCoverCrop),
            collection: self.answer(Field::Collection),
            unit_approval: self.answer(Field::UnitApproval),
            group_approval: self.answer(Field::GroupApproval),
            linked_article: self.answer(Field::LinkedArticle),
        })
    }

    pub fn booking_date(&self) -> Result<NaiveDate> {
        let raw = self.answer(Field::BookingDate);
        NaiveDate::parse_from_str(raw.trim(), BOOKING_DATE_FORMAT).map_err(|err| {
            LedgerError::InvalidRecord(format!(
                "record {} booking date `{}` is not YYYY-MM-DD: {err}",
                self.seq, raw
            ))
            .into()
        })
    }

    /// Grouping key in the ledger.
    pub fn date_key(&self) -> Result<DateKey> {
        Ok(DateKey::from(self.booking_date()?))
    }

    /// Folder that receives this record's media: `{seq}_{YYYYMMDD}`.
    pub fn media_folder_name(&self) -> Result<String> {
        Ok(format!("{}_{}", self.seq, self.booking_date()?.format("%Y%m%d")))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RecordFile {
    Many(Vec<BookingRecord>),
    One(BookingRecord),
}

/// Read a JSON file holding one record or an array of records.
pub fn load_records(path: &Path) -> Result<Vec<BookingRecord>> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let parsed: RecordFile = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse booking records in {}", path.display()))?;
    Ok(match parsed {
        RecordFile::Many(records) => records,
        RecordFile::One(record) => vec![record],
    })
}
