// Dashboard translations (English + Hindi)
//
// Pages take `?lang=hi` (or a hidden `lang` form field); anything else
// renders English. Unknown keys render the key itself.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    #[default]
    En,
    Hi,
}

impl Lang {
    /// Unknown or missing codes render English
    pub fn from_code(code: Option<&str>) -> Self {
        match code.map(|c| c.trim().to_ascii_lowercase()).as_deref() {
            Some("hi") => Lang::Hi,
            _ => Lang::En,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Lang::En => "en",
            Lang::Hi => "hi",
        }
    }

    /// The language the toggle switches to
    pub fn other(self) -> Self {
        match self {
            Lang::En => Lang::Hi,
            Lang::Hi => Lang::En,
        }
    }

    /// Name of this language written in itself
    pub fn native_name(self) -> &'static str {
        match self {
            Lang::En => "English",
            Lang::Hi => "हिन्दी",
        }
    }

    pub fn text(self, key: &'static str) -> &'static str {
        get_text(self, key)
    }
}

/// key → (English, Hindi)
static TRANSLATIONS: LazyLock<FxHashMap<&'static str, (&'static str, &'static str)>> = LazyLock::new(|| {
    [
        ("app_title", "Agro Advisor", "एग्रो सलाहकार"),
        ("tagline", "AI-Powered Smart Farming", "AI-संचालित स्मार्ट खेती"),
        ("subtitle", "Helping farmers reduce risk and improve yield", "किसानों को जोखिम कम करने और उपज बढ़ाने में मदद"),
        ("home", "Home", "होम"),
        ("market", "Market", "बाजार"),
        ("chatbot", "Chatbot", "चैटबॉट"),
        ("about", "About", "परिचय"),
        ("language", "Language", "भाषा"),
        ("field_profile", "Field & Weather Profile", "खेत और मौसम प्रोफाइल"),
        ("soil", "Soil", "मिट्टी"),
        ("soil_type", "Soil type", "मिट्टी का प्रकार"),
        ("manual_entry", "Enter values manually", "मान स्वयं दर्ज करें"),
        ("region_npk", "Region (NPK reference)", "क्षेत्र (NPK संदर्भ)"),
        ("none", "None", "कोई नहीं"),
        ("blank_hint", "Blank fields are filled from the soil type, then the region.", "खाली मान मिट्टी के प्रकार, फिर क्षेत्र से भरे जाते हैं।"),
        ("climate", "Climate", "जलवायु"),
        ("live_weather_location", "Location for live weather", "लाइव मौसम के लिए स्थान"),
        ("temperature", "Temperature (°C)", "तापमान (°C)"),
        ("humidity", "Humidity (%)", "आर्द्रता (%)"),
        ("rainfall", "Rainfall (mm)", "वर्षा (mm)"),
        ("get_recommendations", "Get Smart Recommendations", "स्मार्ट सिफारिशें प्राप्त करें"),
        ("model_missing", "The recommendation model has not been trained yet. Results will be available after running train_model.", "सिफारिश मॉडल अभी प्रशिक्षित नहीं है। train_model चलाने के बाद परिणाम उपलब्ध होंगे।"),
        ("crop_recommendation", "Crop Recommendation", "फसल सिफारिश"),
        ("top_crops_msg", "Top crops identified based on your soil and climate profile", "आपकी मिट्टी और जलवायु प्रोफाइल के आधार पर शीर्ष फसलें"),
        ("inputs", "Inputs", "इनपुट"),
        ("water_requirement", "Water Requirement", "पानी की आवश्यकता"),
        ("irrigations", "Irrigations", "सिंचाई"),
        ("critical_stage", "Critical Stage", "महत्वपूर्ण चरण"),
        ("price", "Price", "कीमत"),
        ("per_quintal", "per quintal", "प्रति क्विंटल"),
        ("trend", "Trend", "रुझान"),
        ("demand", "Demand", "मांग"),
        ("expected_yield", "Expected Yield", "अपेक्षित उपज"),
        ("est_revenue", "Est. Revenue", "अनुमानित आय"),
        ("per_acre", "per acre (approx)", "प्रति एकड़ (लगभग)"),
        ("soil_health", "Soil Health Tips", "मिट्टी स्वास्थ्य सुझाव"),
        ("weather_advisory", "Weather Advisory", "मौसम सलाह"),
        ("fertilizer_rec", "Fertilizer Recommendations", "उर्वरक सिफारिशें"),
        ("nutrient_plan", "Nutrient plan tailored for", "पोषक तत्व योजना के लिए"),
        ("nutrient", "Nutrient", "पोषक तत्व"),
        ("product", "Product", "उत्पाद"),
        ("quantity", "Quantity", "मात्रा"),
        ("why", "Why", "क्यों"),
        ("organic_option", "Organic Option", "जैविक विकल्प"),
        ("new_recommendation", "New recommendation", "नई सिफारिश"),
        ("pest_disease", "Pest & Disease Management", "कीट और रोग प्रबंधन"),
        ("select_disease", "Select a disease to get protection recommendations", "सुरक्षा सिफारिशें प्राप्त करने के लिए रोग चुनें"),
        ("common_diseases", "Common Diseases", "सामान्य रोग"),
        ("severity", "Severity Level", "गंभीरता स्तर"),
        ("get_protection", "Get Protection Plan", "सुरक्षा योजना प्राप्त करें"),
        ("chemical", "Chemical", "रासायनिक"),
        ("dosage", "Dosage per acre", "प्रति एकड़ खुराक"),
        ("frequency", "Frequency", "आवृत्ति"),
        ("safety", "Safety Guidance", "सुरक्षा मार्गदर्शन"),
        ("organic_alt", "Organic Alternative", "जैविक विकल्प"),
        ("market_outlook", "Market Outlook & Prices", "बाजार दृष्टिकोण और कीमतें"),
        ("crop", "Crop", "फसल"),
        ("state", "State", "राज्य"),
        ("look_up", "Look up", "खोजें"),
        ("all_crops", "All crops", "सभी फसलें"),
        ("range", "Range", "सीमा"),
        ("source", "Source", "स्रोत"),
        ("crop_chatbot", "Crop chatbot", "फसल चैटबॉट"),
        ("chat_hint", "Ask about fertilizer, irrigation, pests, seasons or soil for any crop.", "किसी भी फसल के लिए उर्वरक, सिंचाई, कीट, मौसम या मिट्टी के बारे में पूछें।"),
        ("ask", "Ask", "पूछें"),
    ]
    .into_iter()
    .map(|(key, en, hi)| (key, (en, hi)))
    .collect()
});

/// Translated text for `key`
pub fn get_text(lang: Lang, key: &'static str) -> &'static str {
    let Some(&(en, hi)) = TRANSLATIONS.get(key) else {
        return key;
    };
    match lang {
        Lang::En => en,
        Lang::Hi => hi,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lang_from_code() {
        assert_eq!(Lang::from_code(Some("hi")), Lang::Hi);
        assert_eq!(Lang::from_code(Some(" HI ")), Lang::Hi);
        assert_eq!(Lang::from_code(Some("fr")), Lang::En);
        assert_eq!(Lang::from_code(None), Lang::En);
        assert_eq!(Lang::Hi.other(), Lang::En);
    }

    #[test]
    fn test_get_text() {
        assert_eq!(get_text(Lang::En, "price"), "Price");
        assert_eq!(get_text(Lang::Hi, "price"), "कीमत");
        assert_eq!(Lang::Hi.text("pest_disease"), "कीट और रोग प्रबंधन");
        assert_eq!(get_text(Lang::Hi, "no_such_key"), "no_such_key");
    }

    #[test]
    fn test_every_key_has_both_languages() {
        for (key, (en, hi)) in TRANSLATIONS.iter() {
            assert!(!en.is_empty(), "{} has no English text", key);
            assert!(!hi.is_empty(), "{} has no Hindi text", key);
        }
    }
}
