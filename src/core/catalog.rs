//! Pre-trained models and the fixed option sets the service accepts

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Base models hosted by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreTrainedModel {
    StableDiffusion1_5,
    StableDiffusion2_1,
    OpenJourney4,
    OpenJourney2,
    OpenJourney1,
    ModernDisney,
    FutureDiffusion,
    RealisticVision2_0,
}

impl PreTrainedModel {
    pub const ALL: [PreTrainedModel; 8] = [
        PreTrainedModel::StableDiffusion1_5,
        PreTrainedModel::StableDiffusion2_1,
        PreTrainedModel::OpenJourney4,
        PreTrainedModel::OpenJourney2,
        PreTrainedModel::OpenJourney1,
        PreTrainedModel::ModernDisney,
        PreTrainedModel::FutureDiffusion,
        PreTrainedModel::RealisticVision2_0,
    ];

    pub fn id(self) -> &'static str {
        match self {
            PreTrainedModel::StableDiffusion1_5 => "8b1b897c-d66d-45a6-b8d7-8e32421d02cf",
            PreTrainedModel::StableDiffusion2_1 => "ee88d150-4259-4b77-9d0f-090abe29f650",
            PreTrainedModel::OpenJourney4 => "1e7737d7-545e-469f-857f-e4b46eaa151d",
            PreTrainedModel::OpenJourney2 => "d66b1686-5e5d-43b2-a2e7-d295d679917c",
            PreTrainedModel::OpenJourney1 => "7575ea52-3d4f-400f-9ded-09f7b1b1a5b8",
            PreTrainedModel::ModernDisney => "8ead1e66-5722-4ff6-a13f-b5212f575321",
            PreTrainedModel::FutureDiffusion => "1285ded4-b11b-4993-a491-d87cdfe6310c",
            PreTrainedModel::RealisticVision2_0 => "eab32df0-de26-4b83-a908-a83f3015e971",
        }
    }

    /// Alias used for output file names
    pub fn name(self) -> &'static str {
        match self {
            PreTrainedModel::StableDiffusion1_5 => "StableDiffusion1_5",
            PreTrainedModel::StableDiffusion2_1 => "StableDiffusion2_1",
            PreTrainedModel::OpenJourney4 => "OpenJourney4",
            PreTrainedModel::OpenJourney2 => "OpenJourney2",
            PreTrainedModel::OpenJourney1 => "OpenJourney1",
            PreTrainedModel::ModernDisney => "ModernDisney",
            PreTrainedModel::FutureDiffusion => "FutureDiffusion",
            PreTrainedModel::RealisticVision2_0 => "RealisticVision2_0",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            PreTrainedModel::StableDiffusion1_5 => "Stable Diffusion 1.5",
            PreTrainedModel::StableDiffusion2_1 => "Stable Diffusion 2.1",
            PreTrainedModel::OpenJourney4 => "OpenJourney 4",
            PreTrainedModel::OpenJourney2 => "OpenJourney 2",
            PreTrainedModel::OpenJourney1 => "OpenJourney 1",
            PreTrainedModel::ModernDisney => "Modern Disney",
            PreTrainedModel::FutureDiffusion => "Future Diffusion",
            PreTrainedModel::RealisticVision2_0 => "Realistic Vision 2.0",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.id() == id)
    }

    /// Resolve a catalog name (case-insensitive) or a raw model id to an id
    pub fn resolve(name_or_id: &str) -> String {
        Self::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(name_or_id))
            .map(|m| m.id().to_string())
            .unwrap_or_else(|| name_or_id.to_string())
    }
}

impl Default for PreTrainedModel {
    fn default() -> Self {
        PreTrainedModel::OpenJourney4
    }
}

impl fmt::Display for PreTrainedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Define a string-valued option set with its wire names
macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $wire)] $variant),+
        }

        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $(v if v.eq_ignore_ascii_case($wire) => Ok($name::$variant),)+
                    other => Err(format!("unknown {}: {}", stringify!($name), other)),
                }
            }
        }
    };
}

wire_enum! {
    /// Sampler used for an inference
    Sampler {
        Ddim => "ddim",
        Dpm2a => "dpm_2a",
        DpmPlusPlusSde => "dpm_plusplus_sde",
        Euler => "euler",
        EulerA => "euler_a",
        UniPc => "unipc",
    }
}

wire_enum! {
    /// Segmentation mode for a remix
    RemixMode {
        Canny => "canny",
        Mlsd => "mlsd",
        Pose => "pose",
        Scribble => "scribble",
    }
}

wire_enum! {
    /// What a fine-tuned model is learning
    SubjectType {
        Animal => "Animal",
        Boy => "Boy",
        Businessman => "Businessman",
        Businesswoman => "Businesswoman",
        Cat => "Cat",
        Dog => "Dog",
        Girl => "Girl",
        Man => "Man",
        Person => "Person",
        Style => "Style",
        Woman => "Woman",
    }
}

wire_enum! {
    /// Upscaling factor applied to generated images
    Upscale {
        X1 => "x1",
        X2 => "x2",
        X4 => "x4",
    }
}

impl Default for SubjectType {
    fn default() -> Self {
        SubjectType::Person
    }
}
