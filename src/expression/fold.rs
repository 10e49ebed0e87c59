/// Canonicalizes a pattern expression. Control characters are stripped and
/// runs of consecutive `%` collapse to a single `%`, which matches the same
/// set of strings. `_` is preserved as-is. Case is left untouched; the
/// owning column decides whether the folded result is lowercased.
pub fn fold_expression(expression: &str) -> String {
    let mut folded = String::with_capacity(expression.len());
    let mut previous_was_any = false;
    for ch in expression.chars() {
        if ch.is_control() {
            continue;
        }
        if ch == '%' {
            if previous_was_any {
                continue;
            }
            previous_was_any = true;
        } else {
            previous_was_any = false;
        }
        folded.push(ch);
    }
    folded
}
