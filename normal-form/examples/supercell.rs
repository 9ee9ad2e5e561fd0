use normal_form::{Int3x3, Int9x3, IntegerMatrix, hermite_normal_form, smith_normal_form};

fn main() {
    // A supercell of a simple cubic lattice, given by its integer cell matrix.
    let cell = IntegerMatrix::from_rows(&[[2, 1, 0], [0, 3, 1], [1, 0, 2]]);

    let h = hermite_normal_form(&cell).unwrap();
    println!("Hermite normal form:\n{}", h.reduced);
    println!("Transform:\n{}", h.transform);

    let s = smith_normal_form(&cell).unwrap();
    let index = s
        .diagonal
        .diagonal_entries()
        .into_iter()
        .fold(num_bigint::BigInt::from(1), |acc, d| acc * d);
    println!("Smith normal form:\n{}", s.diagonal);
    println!("The supercell contains {index} primitive cells.");

    // Two cells in fractional coordinates with their own denominators.
    let a = Int3x3::from_rows([[1, 0, 0], [0, 1, 0], [0, 0, 1]]);
    let b = Int3x3::from_rows([[1, 1, 0], [0, 1, 1], [1, 0, 1]]);
    let stacked = IntegerMatrix::from_stacked_blocks(&[(a, 2), (b, 3)]).unwrap();
    println!("Stacked cells:\n{stacked}");
    let h = hermite_normal_form(&stacked).unwrap();
    println!("Common lattice:\n{}", h.reduced.submatrix(0, 0, 3, 3));

    // The same with the fixed-size variant.
    let mut m = Int9x3::zero();
    for r in 0..3 {
        for c in 0..3 {
            m[(r, c)] = 3 * a[(r, c)];
            m[(r + 3, c)] = 2 * b[(r, c)];
            m[(r + 6, c)] = 6 * a[(r, c)];
        }
    }
    let s = m.smith_normal_form().unwrap();
    println!("Fixed-size Smith normal form: {:?}", s.diagonal.diagonal_entries());
}
