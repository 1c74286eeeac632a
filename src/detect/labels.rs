use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{anyhow, Result};
use serde::Deserialize;

/// COCO-80 class names, the vocabulary of the general-purpose detector.
pub const COCO_CLASSES: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich", "orange",
    "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch", "potted plant",
    "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote", "keyboard", "cell phone",
    "microwave", "oven", "toaster", "sink", "refrigerator", "book", "clock", "vase", "scissors",
    "teddy bear", "hair drier", "toothbrush",
];

/// Debris classes of the custom-trained detector.
pub const DEBRIS_CLASSES: [&str; 15] = [
    "Mask",
    "can",
    "cellphone",
    "electronics",
    "gbottle",
    "glove",
    "metal",
    "misc",
    "net",
    "pbag",
    "pbottle",
    "plastic",
    "rod",
    "sunglasses",
    "tire",
];

/// Label id to class name table owned by one detection source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelTable {
    names: BTreeMap<u32, String>,
}

/// Accepted on-disk shapes: a plain list (index is the id), an id map, or
/// either of those under a `names` key.
#[derive(Deserialize)]
#[serde(untagged)]
enum LabelFile {
    List(Vec<String>),
    Map(BTreeMap<String, String>),
    Named { names: Box<LabelFile> },
}

impl LabelTable {
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names
                .into_iter()
                .enumerate()
                .map(|(id, name)| (id as u32, name.into()))
                .collect(),
        }
    }

    pub fn coco() -> Self {
        Self::from_names(COCO_CLASSES)
    }

    pub fn debris() -> Self {
        Self::from_names(DEBRIS_CLASSES)
    }

    /// Load a table from a `.toml` or JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read label file {}: {}", path.display(), e))?;
        let file: LabelFile = if path.extension().is_some_and(|ext| ext == "toml") {
            toml::from_str(&raw)
                .map_err(|e| anyhow!("invalid label file {}: {}", path.display(), e))?
        } else {
            serde_json::from_str(&raw)
                .map_err(|e| anyhow!("invalid label file {}: {}", path.display(), e))?
        };
        Self::from_file(file)
    }

    fn from_file(file: LabelFile) -> Result<Self> {
        match file {
            LabelFile::List(names) => Ok(Self::from_names(names)),
            LabelFile::Map(map) => {
                let mut names = BTreeMap::new();
                for (id, name) in map {
                    let id: u32 = id
                        .trim()
                        .parse()
                        .map_err(|_| anyhow!("label id '{}' is not an integer", id))?;
                    names.insert(id, name);
                }
                Ok(Self { names })
            }
            LabelFile::Named { names } => Self::from_file(*names),
        }
    }

    pub fn name(&self, label: u32) -> Option<&str> {
        self.names.get(&label).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
