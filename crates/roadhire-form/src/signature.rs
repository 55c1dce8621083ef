//! Signature capture for one consent.
//!
//! A pad is either drawn or typed, never both; switching modes clears the
//! pad. The image is re-rendered once input settles: 300 ms after a stroke
//! ends, 500 ms after the last keystroke. Callers drive the clock with
//! [`SignaturePad::poll`] or force a render with [`SignaturePad::flush`].

use std::{fmt::Write as _, time::Duration};

use roadhire_core::application::ConsentType;
use tokio::time::Instant;

use crate::answers::Attachment;

/// A rendered signature, ready to upload.
pub type SignatureImage = Attachment;

pub const DRAWN_SETTLE: Duration = Duration::from_millis(300);
pub const TYPED_SETTLE: Duration = Duration::from_millis(500);

pub const SIGNATURE_FONT: &str = "\"Dancing Script\", cursive";

const WIDTH: u32 = 600;
const HEIGHT: u32 = 200;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SignatureMode {
  #[default]
  Drawn,
  Typed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
  pub x: f32,
  pub y: f32,
}

#[derive(Debug)]
pub struct SignaturePad {
  consent:    ConsentType,
  mode:       SignatureMode,
  strokes:    Vec<Vec<Point>>,
  typed:      String,
  image:      Option<SignatureImage>,
  render_due: Option<Instant>,
}

impl SignaturePad {
  pub fn new(consent: ConsentType) -> Self {
    Self {
      consent,
      mode: SignatureMode::default(),
      strokes: Vec::new(),
      typed: String::new(),
      image: None,
      render_due: None,
    }
  }

  pub fn consent(&self) -> ConsentType { self.consent }

  pub fn mode(&self) -> SignatureMode { self.mode }

  /// Switch input mode, discarding whatever the other mode held.
  pub fn set_mode(&mut self, mode: SignatureMode) {
    if mode != self.mode {
      self.clear();
      self.mode = mode;
    }
  }

  pub fn clear(&mut self) {
    self.strokes.clear();
    self.typed.clear();
    self.image = None;
    self.render_due = None;
  }

  pub fn begin_stroke(&mut self, at: Point) {
    if self.mode != SignatureMode::Drawn {
      return;
    }
    self.strokes.push(vec![at]);
    self.render_due = None;
  }

  pub fn extend_stroke(&mut self, to: Point) {
    if let Some(stroke) = self.strokes.last_mut() {
      stroke.push(to);
    }
  }

  pub fn end_stroke(&mut self) {
    if self.mode == SignatureMode::Drawn && !self.strokes.is_empty() {
      self.render_due = Some(Instant::now() + DRAWN_SETTLE);
    }
  }

  pub fn set_typed(&mut self, text: impl Into<String>) {
    if self.mode != SignatureMode::Typed {
      return;
    }
    self.typed = text.into();
    self.render_due = Some(Instant::now() + TYPED_SETTLE);
  }

  /// Render if input has settled. Returns the current image.
  pub fn poll(&mut self) -> Option<&SignatureImage> {
    if self.render_due.is_some_and(|due| Instant::now() >= due) {
      self.render();
    }
    self.image.as_ref()
  }

  /// Render any pending input now.
  pub fn flush(&mut self) -> Option<&SignatureImage> {
    if self.render_due.is_some() {
      self.render();
    }
    self.image.as_ref()
  }

  pub fn image(&self) -> Option<&SignatureImage> { self.image.as_ref() }

  fn render(&mut self) {
    self.render_due = None;
    let svg = match self.mode {
      SignatureMode::Drawn => render_strokes(&self.strokes),
      SignatureMode::Typed => render_text(&self.typed),
    };
    self.image = svg.map(|svg| {
      Attachment::new(
        svg.into_bytes(),
        "image/svg+xml",
        format!("{}.svg", self.consent.upload_label()),
      )
    });
  }
}

fn svg_open() -> String {
  format!(
    "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{WIDTH}\" height=\"{HEIGHT}\" \
     viewBox=\"0 0 {WIDTH} {HEIGHT}\">"
  )
}

fn render_strokes(strokes: &[Vec<Point>]) -> Option<String> {
  if strokes.iter().all(Vec::is_empty) {
    return None;
  }
  let mut svg = svg_open();
  svg.push_str(
    "<g fill=\"none\" stroke=\"#000\" stroke-width=\"2.5\" \
     stroke-linecap=\"round\" stroke-linejoin=\"round\">",
  );
  for stroke in strokes.iter().filter(|s| !s.is_empty()) {
    let mut d = String::new();
    for (i, p) in stroke.iter().enumerate() {
      let cmd = if i == 0 { 'M' } else { 'L' };
      let _ = write!(d, "{cmd}{:.1} {:.1} ", p.x, p.y);
    }
    // A tap still leaves a dot.
    if stroke.len() == 1 {
      d.push_str("l0.1 0");
    }
    let _ = write!(svg, "<path d=\"{}\"/>", d.trim_end());
  }
  svg.push_str("</g></svg>");
  Some(svg)
}

fn render_text(text: &str) -> Option<String> {
  let text = text.trim();
  if text.is_empty() {
    return None;
  }
  let mut svg = svg_open();
  let _ = write!(
    svg,
    "<text x=\"50%\" y=\"60%\" text-anchor=\"middle\" font-family='{SIGNATURE_FONT}' \
     font-size=\"56\">{}</text></svg>",
    escape_xml(text)
  );
  Some(svg)
}

fn escape_xml(text: &str) -> String {
  let mut out = String::with_capacity(text.len());
  for c in text.chars() {
    match c {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      '"' => out.push_str("&quot;"),
      '\'' => out.push_str("&apos;"),
      c => out.push(c),
    }
  }
  out
}
