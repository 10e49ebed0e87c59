use crate::collation::{Collation, ANY_WEIGHT, SINGLE_WEIGHT};
use crate::expression::fold::fold_expression;
use crate::expression::SortOrders;

/// Folds the expression and maps each character to its collation weight.
/// `%` and `_` map to the reserved wildcard sentinels regardless of
/// collation.
pub fn parse_expression(expression: &str, collation: Collation) -> SortOrders {
    let folded = fold_expression(expression);
    let mut weights = Vec::with_capacity(folded.len());
    for ch in folded.chars() {
        match ch {
            '%' => weights.push(ANY_WEIGHT),
            '_' => weights.push(SINGLE_WEIGHT),
            _ => collation.push_weights(ch, &mut weights),
        }
    }
    SortOrders::from_weights(weights)
}
