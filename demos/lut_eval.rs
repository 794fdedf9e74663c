use lasrc::lut::CoefficientStore;
use std::path::Path;

fn main() {
    let store = CoefficientStore::from_file(
        Path::new("./data/aux/landsat_aerosol_coefficients.txt"),
        8,
    )
    .unwrap();

    let (roatm, ttatmg, satm) = store.evaluate(3, 0.2);
    println!(
        "NIR band @ AOT 0.2: roatm={:.5} ttatmg={:.5} satm={:.5}",
        roatm, ttatmg, satm
    );
}
