//! Class-name tables for detection models.

pub const COCO_CLASSES: [&str; 80] = [
    "person",
    "bicycle",
    "car",
    "motorcycle",
    "airplane",
    "bus",
    "train",
    "truck",
    "boat",
    "traffic light",
    "fire hydrant",
    "stop sign",
    "parking meter",
    "bench",
    "bird",
    "cat",
    "dog",
    "horse",
    "sheep",
    "cow",
    "elephant",
    "bear",
    "zebra",
    "giraffe",
    "backpack",
    "umbrella",
    "handbag",
    "tie",
    "suitcase",
    "frisbee",
    "skis",
    "snowboard",
    "sports ball",
    "kite",
    "baseball bat",
    "baseball glove",
    "skateboard",
    "surfboard",
    "tennis racket",
    "bottle",
    "wine glass",
    "cup",
    "fork",
    "knife",
    "spoon",
    "bowl",
    "banana",
    "apple",
    "sandwich",
    "orange",
    "broccoli",
    "carrot",
    "hot dog",
    "pizza",
    "donut",
    "cake",
    "chair",
    "couch",
    "potted plant",
    "bed",
    "dining table",
    "toilet",
    "tv",
    "laptop",
    "mouse",
    "remote",
    "keyboard",
    "cell phone",
    "microwave",
    "oven",
    "toaster",
    "sink",
    "refrigerator",
    "book",
    "clock",
    "vase",
    "scissors",
    "teddy bear",
    "hair drier",
    "toothbrush",
];

pub fn coco_names() -> Vec<String> {
    COCO_CLASSES.iter().map(|s| s.to_string()).collect()
}

/// Name shown for a class id the table does not cover.
pub fn fallback_name(class_id: u32) -> String {
    format!("class_{class_id}")
}

/// Parse the `names` entry exported models carry in their metadata, a
/// dict literal such as `{0: 'person', 1: 'bicycle'}`.
///
/// Ids missing from the dict get a fallback name. Returns `None` for anything
/// that isn't a non-empty dict of integer keys.
pub fn parse_names(raw: &str) -> Option<Vec<String>> {
    let body = raw.trim().strip_prefix('{')?.strip_suffix('}')?;

    let mut entries = Vec::new();
    for entry in body.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (key, value) = entry.split_once(':')?;
        let id: u32 = key.trim().parse().ok()?;
        let name = value.trim().trim_matches(|c| c == '\'' || c == '"');
        entries.push((id, name.to_string()));
    }

    let len = entries.iter().map(|(id, _)| *id as usize + 1).max()?;
    let mut names: Vec<String> = (0..len as u32).map(fallback_name).collect();
    for (id, name) in entries {
        names[id as usize] = name;
    }
    Some(names)
}
