//! Tokenization helpers shared by the profiler and the attack search.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::ops::Range;
use unicode_normalization::UnicodeNormalization;

static WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\p{L}\p{N}]+").expect("word regex should compile"));

/// English stop-words skipped when picking targets in emotionless text.
pub static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "about", "above", "across", "after", "afterwards", "again", "against", "all",
        "almost", "alone", "along", "already", "also", "although", "always", "am", "among",
        "amongst", "amount", "an", "and", "another", "any", "anyhow", "anyone", "anything",
        "anyway", "anywhere", "are", "around", "as", "at", "back", "be", "became", "because",
        "become", "becomes", "becoming", "been", "before", "beforehand", "behind", "being",
        "below", "beside", "besides", "between", "beyond", "both", "bottom", "but", "by",
        "call", "can", "cannot", "cant", "co", "could", "couldnt", "de", "did", "didn", "do",
        "does", "doesn", "doing", "don", "done", "down", "due", "during", "each", "eg", "eight",
        "either", "eleven", "else", "elsewhere", "empty", "enough", "etc", "even", "ever",
        "every", "everyone", "everything", "everywhere", "except", "few", "fifteen", "fifty",
        "first", "five", "for", "former", "formerly", "forty", "four", "from", "front", "full",
        "further", "get", "give", "go", "had", "has", "hasnt", "have", "he", "hence", "her",
        "here", "hereafter", "hereby", "herein", "hereupon", "hers", "herself", "him",
        "himself", "his", "how", "however", "hundred", "i", "ie", "if", "in", "inc", "indeed",
        "into", "is", "it", "its", "itself", "just", "keep", "kg", "km", "last", "latter",
        "latterly", "least", "less", "ltd", "made", "make", "many", "may", "me", "meanwhile",
        "might", "mill", "mine", "more", "moreover", "most", "mostly", "move", "much", "must",
        "my", "myself", "name", "namely", "neither", "never", "nevertheless", "next", "nine",
        "no", "nobody", "none", "noone", "nor", "not", "nothing", "now", "nowhere", "of",
        "off", "often", "on", "once", "one", "only", "onto", "or", "other", "others",
        "otherwise", "our", "ours", "ourselves", "out", "over", "own", "part", "per",
        "perhaps", "please", "put", "quite", "rather", "re", "really", "regarding", "same",
        "say", "see", "seem", "seemed", "seeming", "seems", "serious", "several", "she",
        "should", "show", "side", "since", "six", "sixty", "so", "some", "somehow", "someone",
        "something", "sometime", "sometimes", "somewhere", "still", "such", "take", "ten",
        "than", "that", "the", "their", "them", "themselves", "then", "thence", "there",
        "thereafter", "thereby", "therefore", "therein", "thereupon", "these", "they",
        "third", "this", "those", "though", "three", "through", "throughout", "thru", "thus",
        "to", "together", "too", "top", "toward", "towards", "twelve", "twenty", "two", "un",
        "under", "unless", "until", "up", "upon", "us", "used", "using", "various", "very",
        "via", "was", "we", "well", "were", "what", "whatever", "when", "whence", "whenever",
        "where", "whereafter", "whereas", "whereby", "wherein", "whereupon", "wherever",
        "whether", "which", "while", "whither", "who", "whoever", "whole", "whom", "whose",
        "why", "will", "with", "within", "without", "would", "yet", "you", "your", "yours",
        "yourself", "yourselves",
    ]
    .into_iter()
    .collect()
});

/// Canonical composed Unicode form used before any matching.
pub fn normalize(text: &str) -> String {
    text.nfc().collect()
}

/// Byte ranges of every alphanumeric word in `text`.
pub fn word_spans(text: &str) -> Vec<Range<usize>> {
    WORD_RE.find_iter(text).map(|m| m.range()).collect()
}

/// Lowercased words of `text`, in order, repeats included.
pub fn lowercase_words(text: &str) -> Vec<String> {
    WORD_RE
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// Candidate target tokens for emotionless text: the same words
/// [`replace_word`] can substitute, minus stop-words and pure numbers,
/// distinct, in text order.
pub fn content_tokens(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    WORD_RE
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .filter(|w| !w.chars().all(char::is_numeric))
        .filter(|w| !STOPWORDS.contains(w.as_str()))
        .filter(|w| seen.insert(w.clone()))
        .collect()
}

/// Replace every whole word equal (case-insensitively) to `target` with
/// `replacement`. Substrings of longer words are never touched.
///
/// Returns `None` when `target` does not occur as a word.
pub fn replace_word(text: &str, target: &str, replacement: &str) -> Option<String> {
    let target = target.to_lowercase();
    let mut out = String::with_capacity(text.len() + replacement.len());
    let mut last = 0;
    let mut replaced = false;
    for span in word_spans(text) {
        if text[span.clone()].to_lowercase() == target {
            out.push_str(&text[last..span.start]);
            out.push_str(replacement);
            last = span.end;
            replaced = true;
        }
    }
    if !replaced {
        return None;
    }
    out.push_str(&text[last..]);
    Some(out)
}
