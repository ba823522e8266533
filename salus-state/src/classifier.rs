use serde::{Serialize, Deserialize};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Category a free-text question resolves to. `Bulario` (pharmaceutical and
/// veterinary reference lookups) is the exempt category: it is always
/// allowed and never charged against the daily budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum QuestionCategory {
    Bulario,
    ExamAnalysis,
    SymptomCheck,
    PrescriptionReading,
    General,
}

impl Default for QuestionCategory {
    fn default() -> Self {
        Self::General
    }
}

impl QuestionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bulario => "bulario",
            Self::ExamAnalysis => "exam_analysis",
            Self::SymptomCheck => "symptom_check",
            Self::PrescriptionReading => "prescription_reading",
            Self::General => "general",
        }
    }
}

impl std::fmt::Display for QuestionCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for QuestionCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bulario" => Ok(Self::Bulario),
            "exam_analysis" => Ok(Self::ExamAnalysis),
            "symptom_check" => Ok(Self::SymptomCheck),
            "prescription_reading" => Ok(Self::PrescriptionReading),
            "general" => Ok(Self::General),
            _ => Err(format!("Unknown question category: {}", s)),
        }
    }
}

/// Medication, veterinary and regulatory vocabulary. A question containing
/// any of these is a reference lookup and takes priority over every other
/// category.
const BULARIO_KEYWORDS: &[&str] = &[
    "bula",
    "bulário",
    "medicamento",
    "remédio",
    "posologia",
    "indicação",
    "indicações",
    "contraindicação",
    "contraindicações",
    "precaução",
    "precauções",
    "interação",
    "interações",
    "efeito adverso",
    "efeitos adversos",
    "efeito colateral",
    "efeitos colaterais",
    "dose",
    "dosagem",
    "administração",
    "período de carência",
    "periodo de carencia",
    "carência",
    "retirada",
    "anvisa",
    "mapa",
    "veterinário",
    "veterinario",
    "vet",
    "animal",
    "agrofit",
    "defensivo",
    "composição",
    "princípio ativo",
    "principio ativo",
    "fabricante",
    "laboratório",
    "laboratorio",
    "genérico",
    "generico",
    "similar",
    "referência",
    "referencia",
    "comprimido",
    "cápsula",
    "capsula",
    "xarope",
    "suspensão",
    "injetável",
    "injetavel",
    "pomada",
    "creme",
    "gel",
    "solução",
    "gotas",
    "ampola",
    "seringa",
    "medicação",
    "tarja",
    "receita",
    "prescrição",
    "antibiótico",
    "antibiotico",
    "anti-inflamatório",
    "antiinflamatorio",
    "analgésico",
    "analgesico",
    "dipirona",
    "paracetamol",
    "ibuprofeno",
    "amoxicilina",
    "azitromicina",
    "cefalexina",
    "dexametasona",
    "prednisolona",
    "ivermectina",
];

const EXAM_KEYWORDS: &[&str] = &["exame", "resultado", "laudo"];
const SYMPTOM_KEYWORDS: &[&str] = &["sintoma", "sinto", "dor"];
const PRESCRIPTION_KEYWORDS: &[&str] = &["prescricao", "receita medica"];

lazy_static::lazy_static! {
    static ref NORMALIZED_BULARIO_KEYWORDS: Vec<String> =
        BULARIO_KEYWORDS.iter().map(|k| normalize_text(k)).collect();
}

/// Lowercases and strips diacritics (NFD decomposition, combining marks
/// dropped) so accented and unaccented variants of a keyword match
/// identically.
pub fn normalize_text(text: &str) -> String {
    text.to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect()
}

/// Maps a raw question to exactly one category. Pure and total: any input,
/// including the empty string, yields a category. Keyword groups are tested
/// in fixed priority order and the first matching group wins.
pub fn classify(question: &str) -> QuestionCategory {
    let normalized = normalize_text(question);

    if NORMALIZED_BULARIO_KEYWORDS.iter().any(|k| normalized.contains(k.as_str())) {
        return QuestionCategory::Bulario;
    }

    if EXAM_KEYWORDS.iter().any(|k| normalized.contains(k)) {
        return QuestionCategory::ExamAnalysis;
    }

    if SYMPTOM_KEYWORDS.iter().any(|k| normalized.contains(k)) {
        return QuestionCategory::SymptomCheck;
    }

    if PRESCRIPTION_KEYWORDS.iter().any(|k| normalized.contains(k)) {
        return QuestionCategory::PrescriptionReading;
    }

    QuestionCategory::General
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn medication_questions_are_bulario() {
        assert_eq!(classify("Qual a posologia da dipirona?"), QuestionCategory::Bulario);
        assert_eq!(classify("qual o princípio ativo?"), QuestionCategory::Bulario);
    }

    #[test]
    fn accented_and_unaccented_variants_match() {
        assert_eq!(classify("preciso do bulário"), QuestionCategory::Bulario);
        assert_eq!(classify("preciso do bulario"), QuestionCategory::Bulario);
        assert_eq!(classify("quais as indicações?"), QuestionCategory::Bulario);
        assert_eq!(classify("quais as indicacoes?"), QuestionCategory::Bulario);
    }

    #[test]
    fn bulario_takes_priority_over_other_groups() {
        // "exame" alone is exam_analysis, but a medication keyword wins
        assert_eq!(
            classify("o exame detectou reação ao medicamento"),
            QuestionCategory::Bulario
        );
        // "dor" alone is symptom_check, but "dose" wins
        assert_eq!(classify("qual a dose para dor?"), QuestionCategory::Bulario);
    }

    #[test]
    fn secondary_groups_cascade_in_order() {
        assert_eq!(classify("meu exame deu alterado"), QuestionCategory::ExamAnalysis);
        assert_eq!(classify("saiu o resultado hoje"), QuestionCategory::ExamAnalysis);
        assert_eq!(classify("Estou com dor de cabeça"), QuestionCategory::SymptomCheck);
        assert_eq!(classify("sinto um incômodo no peito"), QuestionCategory::SymptomCheck);
    }

    #[test]
    fn prescription_vocabulary_is_shadowed_by_the_reference_list() {
        // "prescrição" and "receita" are themselves reference keywords, so
        // the prescription group only matches text that dodges them both.
        assert_eq!(classify("como leio essa prescrição?"), QuestionCategory::Bulario);
        assert_eq!(classify("li a receita medica errada"), QuestionCategory::Bulario);
    }

    #[test]
    fn empty_and_unmatched_input_fall_back_to_general() {
        assert_eq!(classify(""), QuestionCategory::General);
        assert_eq!(classify("bom dia!"), QuestionCategory::General);
    }

    #[test]
    fn classification_is_deterministic() {
        let text = "Estou com dor de cabeça";
        assert_eq!(classify(text), classify(text));
    }

    #[test]
    fn category_round_trips_through_str() {
        for category in [
            QuestionCategory::Bulario,
            QuestionCategory::ExamAnalysis,
            QuestionCategory::SymptomCheck,
            QuestionCategory::PrescriptionReading,
            QuestionCategory::General,
        ] {
            assert_eq!(category.as_str().parse::<QuestionCategory>(), Ok(category));
        }
        assert!("anything else".parse::<QuestionCategory>().is_err());
    }
}
