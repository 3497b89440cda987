use std::{collections::BTreeMap, fmt::Display};

/// Label-wise performance values.
#[derive(Debug, Default, Clone)]
struct LabelMeasure {
    /// Number of correct predictions.
    num_correct: usize,
    /** Number of occurrences of the label in the gold-standard data. */
    num_observation: usize,
    /** Number of predictions. */
    num_prediction: usize,
    precision: f64,
    recall: f64,
    fmeasure: f64,
}

/// Token-level comparison of predicted output sequences against references.
#[derive(Debug, Default)]
pub struct Evaluation {
    tbl: BTreeMap<String, LabelMeasure>,

    /** Number of correctly predicted items. */
    item_total_correct: usize,
    /** Total number of items. */
    item_total_num: usize,

    /** Number of correctly predicted sequences. */
    inst_total_correct: usize,
    /** Total number of sequences. */
    inst_total_num: usize,

    macro_precision: f64,
    macro_recall: f64,
    macro_fmeasure: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Estimation {
    pub precision: f64,
    pub recall: f64,
    pub fmeasure: f64,
    pub item_accuracy: f64,
    pub instance_accuracy: f64,
}

impl Evaluation {
    /// Adds one sequence. Positions are compared by their textual form; a
    /// missing or shorter prediction counts its absent items as wrong.
    pub fn accumulate<R: Display, P: Display>(&mut self, reference: &[R], prediction: &[P]) {
        let mut matched = 0;
        for (i, r) in reference.iter().enumerate() {
            let r = r.to_string();
            self.tbl.entry(r.clone()).or_default().num_observation += 1;
            if let Some(p) = prediction.get(i).map(ToString::to_string) {
                if r == p {
                    self.tbl.entry(r).or_default().num_correct += 1;
                    matched += 1;
                }
                self.tbl.entry(p).or_default().num_prediction += 1;
            }
            self.item_total_num += 1;
        }
        self.item_total_correct += matched;

        if matched == reference.len() {
            self.inst_total_correct += 1;
        }
        self.inst_total_num += 1;
    }

    pub fn evaluate(&mut self) -> Estimation {
        self.macro_precision = 0.0;
        self.macro_recall = 0.0;
        self.macro_fmeasure = 0.0;
        let mut num_labels = 0;
        for lev in self.tbl.values_mut() {
            lev.precision = 0.0;
            lev.recall = 0.0;
            lev.fmeasure = 0.0;
            if lev.num_observation == 0 {
                continue;
            }
            num_labels += 1;

            if lev.num_prediction > 0 {
                lev.precision = lev.num_correct as f64 / lev.num_prediction as f64;
            }
            lev.recall = lev.num_correct as f64 / lev.num_observation as f64;
            if lev.precision + lev.recall > 0.0 {
                lev.fmeasure = lev.precision * lev.recall * 2.0 / (lev.precision + lev.recall);
            }
            self.macro_precision += lev.precision;
            self.macro_recall += lev.recall;
            self.macro_fmeasure += lev.fmeasure;
        }

        if num_labels > 0 {
            self.macro_precision /= num_labels as f64;
            self.macro_recall /= num_labels as f64;
            self.macro_fmeasure /= num_labels as f64;
        }

        Estimation {
            precision: self.macro_precision,
            recall: self.macro_recall,
            fmeasure: self.macro_fmeasure,
            item_accuracy: ratio(self.item_total_correct, self.item_total_num),
            instance_accuracy: ratio(self.inst_total_correct, self.inst_total_num),
        }
    }
}

fn ratio(n: usize, d: usize) -> f64 {
    if d > 0 {
        n as f64 / d as f64
    } else {
        0.0
    }
}

impl Display for Evaluation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Performance by label (#match, #model, #ref) (precision, recall, F1):")?;
        for (label, lev) in &self.tbl {
            if lev.num_observation == 0 {
                writeln!(
                    f,
                    "\t{}: ({}, {}, {}) (******, ******, ******)",
                    label, lev.num_correct, lev.num_prediction, lev.num_observation
                )?;
            } else {
                writeln!(
                    f,
                    "\t{}: ({}, {}, {}) ({:.4}, {:.4}, {:.4})",
                    label,
                    lev.num_correct,
                    lev.num_prediction,
                    lev.num_observation,
                    lev.precision,
                    lev.recall,
                    lev.fmeasure
                )?;
            }
        }
        writeln!(
            f,
            "Macro-average precision, recall, F1: ({:.6}, {:.6}, {:.6})",
            self.macro_precision, self.macro_recall, self.macro_fmeasure
        )?;
        writeln!(
            f,
            "Item accuracy: {}/{} => {:.4}",
            self.item_total_correct,
            self.item_total_num,
            ratio(self.item_total_correct, self.item_total_num)
        )?;
        writeln!(
            f,
            "Sequence accuracy: {}/{} => {:.4}",
            self.inst_total_correct,
            self.inst_total_num,
            ratio(self.inst_total_correct, self.inst_total_num)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_prediction() {
        let mut e = Evaluation::default();
        e.accumulate(&["S", "S", "R"], &["S", "S", "R"]);
        let est = e.evaluate();
        assert_eq!(est.item_accuracy, 1.0);
        assert_eq!(est.instance_accuracy, 1.0);
        assert_eq!(est.precision, 1.0);
        assert_eq!(est.recall, 1.0);
    }

    #[test]
    fn partial_prediction() {
        let mut e = Evaluation::default();
        e.accumulate(&["S", "S", "R", "R"], &["S", "R", "R", "R"]);
        e.accumulate(&["S"], &["S"]);
        let est = e.evaluate();
        assert_eq!(est.item_accuracy, 4.0 / 5.0);
        assert_eq!(est.instance_accuracy, 0.5);
        // S: 2 correct of 2 predicted, 3 observed. R: 2 of 3, 2 observed.
        assert!((est.precision - (1.0 + 2.0 / 3.0) / 2.0).abs() < 1e-12);
        assert!((est.recall - (2.0 / 3.0 + 1.0) / 2.0).abs() < 1e-12);
        // evaluating twice gives the same answer
        assert_eq!(e.evaluate(), est);
    }

    #[test]
    fn missing_prediction() {
        let mut e = Evaluation::default();
        e.accumulate::<_, String>(&["S", "R"], &[]);
        let est = e.evaluate();
        assert_eq!(est.item_accuracy, 0.0);
        assert_eq!(est.instance_accuracy, 0.0);
        assert!(e.to_string().contains("Item accuracy: 0/2"));
    }
}
