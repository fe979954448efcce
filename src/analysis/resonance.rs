// Resonance description - qualitative labels over formant estimates

use serde::{Deserialize, Serialize};

use super::formant::Formants;

/// Output language for resonance descriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Zh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Descriptor {
    StrongOral,
    ChestDominant,
    Forward,
    Back,
    ShorterTract,
    LongerTract,
}

impl Descriptor {
    fn text(self, locale: Locale) -> &'static str {
        match (self, locale) {
            (Descriptor::StrongOral, Locale::En) => "Strong oral resonance",
            (Descriptor::StrongOral, Locale::Zh) => "口腔共振明显",
            (Descriptor::ChestDominant, Locale::En) => "Chest resonance dominant",
            (Descriptor::ChestDominant, Locale::Zh) => "胸腔共振为主",
            (Descriptor::Forward, Locale::En) => "Forward resonance",
            (Descriptor::Forward, Locale::Zh) => "前置共振",
            (Descriptor::Back, Locale::En) => "Back resonance",
            (Descriptor::Back, Locale::Zh) => "后置共振",
            (Descriptor::ShorterTract, Locale::En) => "Shorter vocal tract",
            (Descriptor::ShorterTract, Locale::Zh) => "较短声道特征",
            (Descriptor::LongerTract, Locale::En) => "Longer vocal tract",
            (Descriptor::LongerTract, Locale::Zh) => "较长声道特征",
        }
    }
}

impl Locale {
    fn separator(self) -> &'static str {
        match self {
            Locale::En => ", ",
            Locale::Zh => "，",
        }
    }

    fn no_resonance(self) -> &'static str {
        match self {
            Locale::En => "No resonance detected",
            Locale::Zh => "未检测到共振",
        }
    }

    fn neutral(self) -> &'static str {
        match self {
            Locale::En => "Neutral resonance",
            Locale::Zh => "共振中性",
        }
    }
}

/// Human-readable summary of where the voice resonates
///
/// Requires F1 and F2; F3 only adds the vocal tract length hint.
pub fn describe_resonance(formants: &Formants, locale: Locale) -> String {
    let (f1, f2) = match (formants.f1, formants.f2) {
        (Some(f1), Some(f2)) => (f1, f2),
        _ => return locale.no_resonance().to_string(),
    };

    let mut descriptors = Vec::with_capacity(3);

    if f1 > 600.0 {
        descriptors.push(Descriptor::StrongOral);
    } else if f1 < 400.0 {
        descriptors.push(Descriptor::ChestDominant);
    }

    if f2 > 1800.0 {
        descriptors.push(Descriptor::Forward);
    } else if f2 < 1200.0 {
        descriptors.push(Descriptor::Back);
    }

    if let Some(f3) = formants.f3 {
        if f3 > 2800.0 {
            descriptors.push(Descriptor::ShorterTract);
        } else if f3 < 2400.0 {
            descriptors.push(Descriptor::LongerTract);
        }
    }

    if descriptors.is_empty() {
        return locale.neutral().to_string();
    }

    descriptors
        .iter()
        .map(|d| d.text(locale))
        .collect::<Vec<_>>()
        .join(locale.separator())
}
