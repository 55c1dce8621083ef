//! The nine-step application wizard.
//!
//! Each step owns a slice of the answers. [`Wizard::next`] validates only the
//! current step; [`Wizard::submit_attempt`] validates all of them and lands
//! on the first step that still has problems. Every change to the answers
//! goes through [`Wizard::update`], which schedules a draft save.

use std::{fmt, sync::Arc};

use chrono::NaiveDate;
use roadhire_core::{
  application::ConsentType,
  dates::today_local,
  intake::{
    LICENSE_BACK_PART, LICENSE_FRONT_PART, check_consent_accepted,
    check_employment_records, check_previous_addresses,
  },
  validation::{ValidationErrors, require},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
  answers::{Attachment, FormAnswers, FormFiles},
  draft::{Draft, DraftMirror, DraftStore},
  submit::SubmissionPayload,
};

// ─── Steps ───────────────────────────────────────────────────────────────────

/// A wizard step, `1..=9`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Step(u8);

impl Step {
  pub const FIRST: Step = Step(1);
  pub const LAST: Step = Step(9);

  pub fn new(number: u8) -> Option<Self> {
    (Self::FIRST.0..=Self::LAST.0)
      .contains(&number)
      .then_some(Self(number))
  }

  pub fn number(self) -> u8 { self.0 }

  pub fn all() -> impl Iterator<Item = Step> { (Self::FIRST.0..=Self::LAST.0).map(Step) }

  pub fn next(self) -> Option<Step> { Self::new(self.0 + 1) }

  pub fn prev(self) -> Option<Step> { self.0.checked_sub(1).and_then(Self::new) }

  pub fn title(self) -> &'static str {
    match self.0 {
      1 => "Personal information",
      2 => "Address history",
      3 => "Driver's license",
      4 => "Medical card",
      5 => "Employment history",
      6 => "Background check authorization",
      7 => "Alcohol and drug testing",
      8 => "Safety performance and PSP",
      _ => "Clearinghouse, MVR and review",
    }
  }

  /// The consents signed on this step.
  pub fn consents(self) -> &'static [ConsentType] {
    match self.0 {
      6 => &[ConsentType::Authorization],
      7 => &[ConsentType::AlcoholDrug],
      8 => &[ConsentType::SafetyPerformance, ConsentType::Psp],
      9 => &[ConsentType::Clearinghouse, ConsentType::Mvr],
      _ => &[],
    }
  }
}

impl TryFrom<u8> for Step {
  type Error = String;

  fn try_from(number: u8) -> Result<Self, Self::Error> {
    Step::new(number).ok_or_else(|| format!("step {number} is outside 1..=9"))
  }
}

impl From<Step> for u8 {
  fn from(step: Step) -> u8 { step.0 }
}

impl fmt::Display for Step {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/9 {}", self.0, self.title())
  }
}

// ─── Step validation ─────────────────────────────────────────────────────────

fn require_file(errors: &mut ValidationErrors, field: &str, file: Option<&Attachment>, label: &str) {
  if file.is_none_or(Attachment::is_empty) {
    errors.push(field, format!("Upload {label}"));
  }
}

/// Accepted, and signed with the consent's own (or shared) signature.
fn check_signed(
  answers: &FormAnswers,
  files: &FormFiles,
  consent: ConsentType,
  errors: &mut ValidationErrors,
) {
  check_consent_accepted(&answers.fields.legal_consents, consent, errors);
  let source = consent.signature_source();
  if consent == source && !files.has_signature(source) {
    errors.push(source.signature_part(), "Sign to continue");
  }
}

/// The rules for one step against `today`.
pub fn validate_step(
  step: Step,
  answers: &FormAnswers,
  files: &FormFiles,
  today: NaiveDate,
) -> ValidationErrors {
  let mut errors = ValidationErrors::new();
  let fields = &answers.fields;
  let applicant = &fields.applicant;

  match step.number() {
    1 => {
      applicant.check_identity(&mut errors);
      applicant.check_date_of_birth(&mut errors);
      applicant.check_ssn(&mut errors);
    }
    2 => {
      applicant.check_current_address(&mut errors);
      if applicant.keeps_address_history() {
        check_previous_addresses(&fields.previous_addresses, &mut errors);
      }
    }
    3 => {
      fields.license.check_details(&mut errors);
      fields.license.check_expiration(today, &mut errors);
      require_file(&mut errors, LICENSE_FRONT_PART, files.license_front.as_ref(), "the front of your license");
      require_file(&mut errors, LICENSE_BACK_PART, files.license_back.as_ref(), "the back of your license");
    }
    4 => applicant.check_medical_card_expiration(&mut errors),
    5 => check_employment_records(&fields.employment_records, &mut errors),
    6 => check_signed(answers, files, ConsentType::Authorization, &mut errors),
    7 => {
      if applicant.alcohol_drug_return_to_duty.is_none() {
        errors.push(
          "alcoholDrugReturnToDuty",
          "Tell us whether you have completed a return-to-duty process",
        );
      }
      require(&mut errors, "alcoholDrugFormName", &answers.alcohol_drug_form_name, "Printed name");
      check_signed(answers, files, ConsentType::AlcoholDrug, &mut errors);
    }
    8 => {
      require(&mut errors, "pspFullName", &answers.psp_full_name, "Full name");
      check_signed(answers, files, ConsentType::SafetyPerformance, &mut errors);
      check_signed(answers, files, ConsentType::Psp, &mut errors);
    }
    _ => {
      check_signed(answers, files, ConsentType::Clearinghouse, &mut errors);
      check_signed(answers, files, ConsentType::Mvr, &mut errors);
    }
  }
  errors
}

// ─── Submission attempt ──────────────────────────────────────────────────────

/// Per-step problems found by a full validation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
  pub steps: Vec<(Step, ValidationErrors)>,
}

impl StepReport {
  pub fn first_failing(&self) -> Option<Step> { self.steps.first().map(|(s, _)| *s) }
}

impl fmt::Display for StepReport {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (step, errors) in &self.steps {
      writeln!(f, "Step {step}:")?;
      for e in errors.iter() {
        writeln!(f, "  {}: {}", e.field, e.message)?;
      }
    }
    Ok(())
  }
}

#[derive(Debug, Error)]
pub enum AttemptError {
  #[error("submission is only possible from the review step")]
  NotOnReviewStep,

  #[error("some answers need attention:\n{0}")]
  Incomplete(StepReport),

  #[error("failed to encode answers: {0}")]
  Encode(#[from] serde_json::Error),
}

// ─── Wizard ──────────────────────────────────────────────────────────────────

pub struct Wizard<D> {
  step:    Step,
  answers: FormAnswers,
  files:   FormFiles,
  errors:  ValidationErrors,
  mirror:  DraftMirror<D>,
}

impl<D: DraftStore> Wizard<D> {
  /// Start from the stored draft, if there is a usable one.
  pub async fn restore(store: Arc<D>) -> Self {
    let (step, answers) = match store.load().await {
      Ok(Some(draft)) => {
        info!(step = draft.step.number(), "restored draft");
        (draft.step, draft.answers)
      }
      Ok(None) => (Step::FIRST, FormAnswers::default()),
      Err(e) => {
        warn!(error = %e, "discarding unreadable draft");
        (Step::FIRST, FormAnswers::default())
      }
    };
    Self {
      step,
      answers,
      files: FormFiles::default(),
      errors: ValidationErrors::new(),
      mirror: DraftMirror::new(store),
    }
  }

  pub fn step(&self) -> Step { self.step }

  pub fn answers(&self) -> &FormAnswers { &self.answers }

  pub fn files(&self) -> &FormFiles { &self.files }

  /// Messages from the last failed [`Wizard::next`] or submit attempt.
  pub fn errors(&self) -> &ValidationErrors { &self.errors }

  fn draft(&self) -> Draft {
    Draft { step: self.step, answers: self.answers.clone() }
  }

  /// Change the answers and schedule a draft save.
  pub fn update(&mut self, change: impl FnOnce(&mut FormAnswers)) {
    change(&mut self.answers);
    self.mirror.schedule(self.draft());
  }

  /// Change the attachments. Never persisted.
  pub fn update_files(&mut self, change: impl FnOnce(&mut FormFiles)) { change(&mut self.files); }

  pub fn set_signature(&mut self, consent: ConsentType, image: Option<Attachment>) {
    match image {
      Some(image) => self.files.signatures.insert(consent, image),
      None => self.files.signatures.remove(&consent),
    };
  }

  /// Validate the current step and advance.
  pub fn next(&mut self) -> Result<Step, ValidationErrors> { self.next_on(today_local()) }

  pub fn next_on(&mut self, today: NaiveDate) -> Result<Step, ValidationErrors> {
    let errors = validate_step(self.step, &self.answers, &self.files, today);
    if !errors.is_empty() {
      self.errors = errors.clone();
      return Err(errors);
    }
    self.errors = ValidationErrors::new();
    self.answers.fill_printed_names();
    if let Some(next) = self.step.next() {
      self.step = next;
    }
    self.mirror.schedule(self.draft());
    Ok(self.step)
  }

  /// Go back one step without validating. `false` on the first step.
  pub fn back(&mut self) -> bool {
    let Some(prev) = self.step.prev() else {
      return false;
    };
    self.step = prev;
    self.errors = ValidationErrors::new();
    self.mirror.schedule(self.draft());
    true
  }

  pub fn submit_attempt(&mut self) -> Result<SubmissionPayload, AttemptError> {
    self.submit_attempt_on(today_local())
  }

  /// Validate every step. On failure, move to the first failing step.
  pub fn submit_attempt_on(&mut self, today: NaiveDate) -> Result<SubmissionPayload, AttemptError> {
    if self.step != Step::LAST {
      return Err(AttemptError::NotOnReviewStep);
    }

    let steps: Vec<_> = Step::all()
      .map(|step| (step, validate_step(step, &self.answers, &self.files, today)))
      .filter(|(_, errors)| !errors.is_empty())
      .collect();

    if let Some((first, errors)) = steps.first() {
      self.step = *first;
      self.errors = errors.clone();
      self.mirror.schedule(self.draft());
      return Err(AttemptError::Incomplete(StepReport { steps }));
    }

    Ok(SubmissionPayload::assemble(&self.answers, &self.files)?)
  }

  /// Save the draft immediately.
  pub async fn flush(&mut self) {
    let draft = self.draft();
    self.mirror.flush(draft).await;
  }

  /// After a successful submission: forget the draft and start over.
  pub async fn complete(&mut self) {
    self.mirror.purge().await;
    self.step = Step::FIRST;
    self.answers = FormAnswers::default();
    self.files = FormFiles::default();
    self.errors = ValidationErrors::new();
  }
}
