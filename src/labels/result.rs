use crate::config::Config;

/// Normalized instance location, all values in `0..=1` relative to the frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    /// Clip to the unit square. Returns `None` for empty or non-finite boxes.
    pub fn clipped(self) -> Option<Self> {
        let values = [self.left, self.top, self.width, self.height];
        if values.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let left = self.left.clamp(0.0, 1.0);
        let top = self.top.clamp(0.0, 1.0);
        let right = (self.left + self.width).clamp(0.0, 1.0);
        let bottom = (self.top + self.height).clamp(0.0, 1.0);
        if right <= left || bottom <= top {
            return None;
        }
        Some(Self {
            left,
            top,
            width: right - left,
            height: bottom - top,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Label {
    pub name: String,
    /// Percentage in `0..=100`.
    pub confidence: f32,
    pub instances: Vec<BoundingBox>,
}

impl Label {
    pub fn new(name: impl Into<String>, confidence: f32) -> Self {
        Self {
            name: name.into(),
            confidence,
            instances: Vec::new(),
        }
    }

    pub fn with_instance(mut self, bbox: BoundingBox) -> Self {
        self.instances.push(bbox);
        self
    }

    /// Overlay text, e.g. `Person (98.2%)`.
    pub fn caption(&self) -> String {
        format!("{} ({:.1}%)", self.name, self.confidence)
    }
}

/// Ordered labels for one frame, most relevant first.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LabelResult {
    labels: Vec<Label>,
}

impl LabelResult {
    pub fn new(labels: Vec<Label>) -> Self {
        Self { labels }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Label> {
        self.labels.iter()
    }

    /// Apply the configured limits.
    ///
    /// Keeps service order, drops records whose confidence is not a finite
    /// percentage or is below `min_confidence`, clips instance boxes, and
    /// truncates to `max_labels`.
    pub fn constrain(self, config: &Config) -> Self {
        let min_confidence = config.min_confidence();
        let labels = self
            .labels
            .into_iter()
            .filter(|label| {
                label.confidence.is_finite()
                    && (0.0..=100.0).contains(&label.confidence)
                    && label.confidence >= min_confidence
            })
            .map(|mut label| {
                label.instances = label
                    .instances
                    .into_iter()
                    .filter_map(BoundingBox::clipped)
                    .collect();
                label
            })
            .take(config.max_labels() as usize)
            .collect();
        Self { labels }
    }
}

impl<'a> IntoIterator for &'a LabelResult {
    type Item = &'a Label;
    type IntoIter = std::slice::Iter<'a, Label>;

    fn into_iter(self) -> Self::IntoIter {
        self.labels.iter()
    }
}
