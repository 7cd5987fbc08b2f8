/*!
# CSV outputs

The R-hat table of a run and, optionally, a flat export of every chain draw.
*/

use std::fs::File;
use std::path::Path;

use ::csv::Writer;
use ndarray::{ArrayView1, ArrayView3, Axis};

use crate::error::Result;
use crate::stats::dimension_labels;

/**
Writes the per-dimension R-hat table.

The file has a header `dimension,rhat` followed by one row per dimension, labelled
`x0`, `x1`, ... with values rounded to four decimals (`NaN` stays `NaN`).

# Examples

```rust
use flowmc_toys::io::csv::save_rhat_table;
use ndarray::arr1;

let path = std::env::temp_dir().join("flowmc_toys_rhat_doc.csv");
save_rhat_table(arr1(&[1.0012, 0.9998]).view(), &path)?;
# Ok::<(), flowmc_toys::Error>(())
```
*/
pub fn save_rhat_table(rhat: ArrayView1<f64>, path: impl AsRef<Path>) -> Result<()> {
    let mut wtr = Writer::from_writer(File::create(path)?);
    wtr.write_record(["dimension", "rhat"])?;
    for (label, value) in dimension_labels(rhat.len()).iter().zip(rhat.iter()) {
        let value = format!("{value:.4}");
        wtr.write_record([label.as_str(), value.as_str()])?;
    }
    wtr.flush()?;
    Ok(())
}

/**
Saves chain positions (`[n_chains, n_draws, n_dims]`) as CSV.

Header: `chain,draw,x0,x1,...`; one row per draw of each chain, chains in order.
*/
pub fn save_positions(positions: ArrayView3<f64>, path: impl AsRef<Path>) -> Result<()> {
    let mut wtr = Writer::from_writer(File::create(path)?);
    let n_dims = positions.len_of(Axis(2));

    let mut header = vec!["chain".to_string(), "draw".to_string()];
    header.extend(dimension_labels(n_dims));
    wtr.write_record(&header)?;

    for (chain_idx, chain) in positions.axis_iter(Axis(0)).enumerate() {
        for (draw_idx, draw) in chain.axis_iter(Axis(0)).enumerate() {
            let mut row = vec![chain_idx.to_string(), draw_idx.to_string()];
            row.extend(draw.iter().map(|v| v.to_string()));
            wtr.write_record(&row)?;
        }
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr3, Array3};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_rhat_table_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rhat_table.csv");
        save_rhat_table(arr1(&[1.00049, 0.99, f64::NAN]).view(), &path).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let expected = "\
dimension,rhat
x0,1.0005
x1,0.9900
x2,NaN";
        assert_eq!(contents.trim(), expected);
    }

    #[test]
    fn test_positions_multi_chain() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chains.csv");
        let data = arr3(&[[[1.0, 2.0], [3.0, 4.0]], [[10.0, 20.0], [30.5, 40.0]]]);
        save_positions(data.view(), &path).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let expected = "\
chain,draw,x0,x1
0,0,1,2
0,1,3,4
1,0,10,20
1,1,30.5,40";
        assert_eq!(contents.trim(), expected);
    }

    #[test]
    fn test_positions_without_draws() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chains.csv");
        save_positions(Array3::<f64>::zeros((2, 0, 3)).view(), &path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap().trim(), "chain,draw,x0,x1,x2");
    }

    #[test]
    fn test_unwritable_path_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("rhat_table.csv");
        assert!(save_rhat_table(arr1(&[1.0]).view(), &path).is_err());
    }
}
