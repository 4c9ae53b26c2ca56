//! Entities stored by the question store.
//!
//! `FeedbackQuestion` is the persisted record, `NewQuestion` the input for a
//! create and `QuestionUpdate` the partial input for an update.

use chrono::{DateTime, Utc};
use feedback_ids::QuestionId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// `number_of_entities_to_give_feedback_to` value meaning "no cap".
pub const UNLIMITED_RECIPIENTS: i32 = -100;

// ============================================================================
// Session
// ============================================================================

/// Identity of a feedback session within a course.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionKey {
    pub course_id: String,
    pub session_name: String,
}

impl SessionKey {
    pub fn new(course_id: impl Into<String>, session_name: impl Into<String>) -> Self {
        Self {
            course_id: course_id.into(),
            session_name: session_name.into(),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.course_id, self.session_name)
    }
}

/// A feedback session record. Owns its questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackSession {
    pub course_id: String,
    pub session_name: String,
    pub created_at: DateTime<Utc>,
}

impl FeedbackSession {
    pub fn key(&self) -> SessionKey {
        SessionKey::new(&self.course_id, &self.session_name)
    }
}

// ============================================================================
// Roles and question kinds
// ============================================================================

/// Who gives feedback, who receives it, and who may see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParticipantType {
    /// The session creator
    #[serde(rename = "SELF")]
    Creator,
    Students,
    Instructors,
    Teams,
    OwnTeam,
    OwnTeamMembers,
    OwnTeamMembersIncludingSelf,
    Receiver,
    ReceiverTeamMembers,
    None,
}

impl ParticipantType {
    pub const ALL: [ParticipantType; 10] = [
        Self::Creator,
        Self::Students,
        Self::Instructors,
        Self::Teams,
        Self::OwnTeam,
        Self::OwnTeamMembers,
        Self::OwnTeamMembersIncludingSelf,
        Self::Receiver,
        Self::ReceiverTeamMembers,
        Self::None,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Creator => "SELF",
            Self::Students => "STUDENTS",
            Self::Instructors => "INSTRUCTORS",
            Self::Teams => "TEAMS",
            Self::OwnTeam => "OWN_TEAM",
            Self::OwnTeamMembers => "OWN_TEAM_MEMBERS",
            Self::OwnTeamMembersIncludingSelf => "OWN_TEAM_MEMBERS_INCLUDING_SELF",
            Self::Receiver => "RECEIVER",
            Self::ReceiverTeamMembers => "RECEIVER_TEAM_MEMBERS",
            Self::None => "NONE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let upper = s.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL.into_iter().find(|p| p.as_str() == upper)
    }

    pub fn is_valid_giver(&self) -> bool {
        matches!(
            self,
            Self::Creator | Self::Students | Self::Instructors | Self::Teams
        )
    }

    pub fn is_valid_recipient(&self) -> bool {
        matches!(
            self,
            Self::Creator
                | Self::Students
                | Self::Instructors
                | Self::Teams
                | Self::OwnTeam
                | Self::OwnTeamMembers
                | Self::OwnTeamMembersIncludingSelf
                | Self::None
        )
    }

    pub fn is_valid_viewer(&self) -> bool {
        matches!(
            self,
            Self::Receiver
                | Self::ReceiverTeamMembers
                | Self::OwnTeamMembers
                | Self::Students
                | Self::Instructors
        )
    }
}

impl fmt::Display for ParticipantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ParticipantType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Unknown participant type: {}", s))
    }
}

/// Kind of question. The payload for each kind lives in `question_metadata`
/// and is not interpreted by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionType {
    Text,
    Mcq,
    Msq,
    #[serde(rename = "NUMSCALE")]
    NumScale,
    #[serde(rename = "CONSTSUM")]
    ConstSum,
    Contrib,
    Rubric,
    RankOptions,
    RankRecipients,
}

impl QuestionType {
    pub const ALL: [QuestionType; 9] = [
        Self::Text,
        Self::Mcq,
        Self::Msq,
        Self::NumScale,
        Self::ConstSum,
        Self::Contrib,
        Self::Rubric,
        Self::RankOptions,
        Self::RankRecipients,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Mcq => "MCQ",
            Self::Msq => "MSQ",
            Self::NumScale => "NUMSCALE",
            Self::ConstSum => "CONSTSUM",
            Self::Contrib => "CONTRIB",
            Self::Rubric => "RUBRIC",
            Self::RankOptions => "RANK_OPTIONS",
            Self::RankRecipients => "RANK_RECIPIENTS",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let upper = s.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL.into_iter().find(|t| t.as_str() == upper)
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Unknown question type: {}", s))
    }
}

// ============================================================================
// Questions
// ============================================================================

/// A stored feedback question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackQuestion {
    pub id: QuestionId,
    pub course_id: String,
    pub session_name: String,
    /// 1-based position within the session
    pub question_number: i32,
    pub question_text: String,
    pub question_metadata: Option<serde_json::Value>,
    pub question_type: QuestionType,
    pub giver_type: ParticipantType,
    pub recipient_type: ParticipantType,
    pub number_of_entities_to_give_feedback_to: i32,
    pub show_responses_to: Vec<ParticipantType>,
    pub show_giver_name_to: Vec<ParticipantType>,
    pub show_recipient_name_to: Vec<ParticipantType>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FeedbackQuestion {
    pub fn session_key(&self) -> SessionKey {
        SessionKey::new(&self.course_id, &self.session_name)
    }

    /// Short identifier used in log lines.
    pub fn backup_identifier(&self) -> String {
        format!(
            "Question {} ({}) in {}/{}",
            self.question_number, self.id, self.course_id, self.session_name
        )
    }
}

/// Input for creating a question.
///
/// A `question_number` of zero or less means "append at the end".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewQuestion {
    #[serde(default)]
    pub question_number: i32,
    pub question_text: String,
    #[serde(default)]
    pub question_metadata: Option<serde_json::Value>,
    pub question_type: QuestionType,
    pub giver_type: ParticipantType,
    pub recipient_type: ParticipantType,
    #[serde(default = "unlimited_recipients")]
    pub number_of_entities_to_give_feedback_to: i32,
    #[serde(default)]
    pub show_responses_to: Vec<ParticipantType>,
    #[serde(default)]
    pub show_giver_name_to: Vec<ParticipantType>,
    #[serde(default)]
    pub show_recipient_name_to: Vec<ParticipantType>,
}

fn unlimited_recipients() -> i32 {
    UNLIMITED_RECIPIENTS
}

impl NewQuestion {
    pub fn new(
        question_text: impl Into<String>,
        question_type: QuestionType,
        giver_type: ParticipantType,
        recipient_type: ParticipantType,
    ) -> Self {
        Self {
            question_number: 0,
            question_text: question_text.into(),
            question_metadata: None,
            question_type,
            giver_type,
            recipient_type,
            number_of_entities_to_give_feedback_to: UNLIMITED_RECIPIENTS,
            show_responses_to: Vec::new(),
            show_giver_name_to: Vec::new(),
            show_recipient_name_to: Vec::new(),
        }
    }

    pub fn at_number(mut self, question_number: i32) -> Self {
        self.question_number = question_number;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.question_metadata = Some(metadata);
        self
    }

    pub fn with_visibility(
        mut self,
        show_responses_to: Vec<ParticipantType>,
        show_giver_name_to: Vec<ParticipantType>,
        show_recipient_name_to: Vec<ParticipantType>,
    ) -> Self {
        self.show_responses_to = show_responses_to;
        self.show_giver_name_to = show_giver_name_to;
        self.show_recipient_name_to = show_recipient_name_to;
        self
    }

    pub fn with_entity_limit(mut self, limit: i32) -> Self {
        self.number_of_entities_to_give_feedback_to = limit;
        self
    }

    /// Materialise the stored record for a freshly minted id.
    pub(crate) fn into_question(
        self,
        id: QuestionId,
        session: &SessionKey,
        question_number: i32,
        now: DateTime<Utc>,
    ) -> FeedbackQuestion {
        FeedbackQuestion {
            id,
            course_id: session.course_id.clone(),
            session_name: session.session_name.clone(),
            question_number,
            question_text: self.question_text,
            question_metadata: self.question_metadata,
            question_type: self.question_type,
            giver_type: self.giver_type,
            recipient_type: self.recipient_type,
            number_of_entities_to_give_feedback_to: self.number_of_entities_to_give_feedback_to,
            show_responses_to: self.show_responses_to,
            show_giver_name_to: self.show_giver_name_to,
            show_recipient_name_to: self.show_recipient_name_to,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of a stored question.
///
/// `None` fields keep the stored value. The identity fields are required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionUpdate {
    pub session: SessionKey,
    pub id: QuestionId,
    #[serde(default)]
    pub question_number: Option<i32>,
    #[serde(default)]
    pub question_text: Option<String>,
    #[serde(default)]
    pub question_metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub question_type: Option<QuestionType>,
    #[serde(default)]
    pub giver_type: Option<ParticipantType>,
    #[serde(default)]
    pub recipient_type: Option<ParticipantType>,
    #[serde(default)]
    pub number_of_entities_to_give_feedback_to: Option<i32>,
    #[serde(default)]
    pub show_responses_to: Option<Vec<ParticipantType>>,
    #[serde(default)]
    pub show_giver_name_to: Option<Vec<ParticipantType>>,
    #[serde(default)]
    pub show_recipient_name_to: Option<Vec<ParticipantType>>,
}

impl QuestionUpdate {
    pub fn new(session: SessionKey, id: QuestionId) -> Self {
        Self {
            session,
            id,
            question_number: None,
            question_text: None,
            question_metadata: None,
            question_type: None,
            giver_type: None,
            recipient_type: None,
            number_of_entities_to_give_feedback_to: None,
            show_responses_to: None,
            show_giver_name_to: None,
            show_recipient_name_to: None,
        }
    }

    pub fn question_number(mut self, number: i32) -> Self {
        self.question_number = Some(number);
        self
    }

    pub fn question_text(mut self, text: impl Into<String>) -> Self {
        self.question_text = Some(text.into());
        self
    }

    pub fn question_type(mut self, question_type: QuestionType) -> Self {
        self.question_type = Some(question_type);
        self
    }

    pub fn giver_type(mut self, giver: ParticipantType) -> Self {
        self.giver_type = Some(giver);
        self
    }

    pub fn recipient_type(mut self, recipient: ParticipantType) -> Self {
        self.recipient_type = Some(recipient);
        self
    }

    pub fn show_responses_to(mut self, viewers: Vec<ParticipantType>) -> Self {
        self.show_responses_to = Some(viewers);
        self
    }
}
