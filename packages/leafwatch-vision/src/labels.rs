/// Output classes of the tomato leaf model, in training order.
pub const TOMATO_LEAF_LABELS: [&str; 10] = [
    "Tomato___Bacterial_spot",
    "Tomato___Early_blight",
    "Tomato___Healthy",
    "Tomato___Late_blight",
    "Tomato___Leaf_Mold",
    "Tomato___Septoria_leaf_spot",
    "Tomato___Spider_mites Two-spotted_spider_mite",
    "Tomato___Target_Spot",
    "Tomato___Tomato_Yellow_Leaf_Curl_Virus",
    "Tomato___Tomato_mosaic_virus",
];

pub fn default_labels() -> Vec<String> {
    TOMATO_LEAF_LABELS.iter().map(|s| s.to_string()).collect()
}
