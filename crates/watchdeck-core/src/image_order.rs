use std::cmp::Ordering;
use std::path::Path;

fn numeric_stem(name: &str) -> Option<u64> {
    Path::new(name).file_stem()?.to_str()?.parse().ok()
}

/// Order image file names so "2.jpg" comes before "10.jpg".
///
/// Names whose stem is an integer sort numerically and ahead of everything
/// else; the rest fall back to plain string order.
pub fn compare_image_names(a: &str, b: &str) -> Ordering {
    match (numeric_stem(a), numeric_stem(b)) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_before_lexicographic() {
        let mut names = vec!["10.jpg", "2.jpg", "1.jpg", "cover.jpg"];
        names.sort_by(|a, b| compare_image_names(a, b));
        assert_eq!(names, vec!["1.jpg", "2.jpg", "10.jpg", "cover.jpg"]);
    }

    #[test]
    fn test_non_numeric_sort_as_strings() {
        let mut names = vec!["b.png", "a10.png", "a2.png"];
        names.sort_by(|a, b| compare_image_names(a, b));
        assert_eq!(names, vec!["a10.png", "a2.png", "b.png"]);
    }

    #[test]
    fn test_same_number_different_extension_is_stable() {
        assert_eq!(compare_image_names("3.jpg", "3.png"), Ordering::Less);
        assert_eq!(compare_image_names("03.jpg", "3.jpg"), Ordering::Less);
    }
}
