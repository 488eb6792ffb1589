use anyhow::{bail, Result};
use chemrxn::*;

const DEMO: &[(&str, &str)] = &[
    ("Zn", "CuSO4"),
    ("Fe", "CuSO4"),
    ("Ag", "CuSO4"),
    ("Mg", "FeCl2"),
    ("Pb", "ZnSO4"),
    ("Ca", "Cu(OH)2"),
    ("Zn", "HCl"),
    ("Mg", "H2SO4"),
    ("Zn", "H3PO4"),
    ("Cu", "HCl"),
    ("Hg", "HCl"),
    ("K", "H2O"),
    ("Ca", "H2O"),
    ("Fe", "H2O"),
    ("Mg", "H2O"),
    ("Cl2", "NaBr"),
    ("Br2", "KI"),
    ("I2", "NaCl"),
    ("Cl2", "NaF"),
    ("H2", "CuSO4"),
    ("Na", "NaCl"),
    ("Al", "Cu(NO3)2"),
    ("Ni", "Pb(NO3)2"),
];

fn report(reactants: &str, prediction: &Prediction, tables: &ReferenceTables) {
    println!("====");
    println!("Reactants: {}", reactants);
    if !prediction.is_possible() {
        println!("No reaction: {}", prediction.reason().unwrap_or("unknown"));
        return;
    }

    let products: Vec<String> = prediction
        .products()
        .iter()
        .map(|product| {
            let state = Formula::parse(product)
                .ok()
                .and_then(|formula| tables.solubility(&formula))
                .map(|solubility| solubility.state())
                .unwrap_or("");
            format!("{}{}", product, state)
        })
        .collect();
    println!("Predicted products: {}", products.join(", "));
    if let Some(kind) = prediction.kind() {
        println!("Subtype: {}", kind);
    }
    match (prediction.balanced_equation(), prediction.warning()) {
        (Some(equation), _) => println!("Balanced: {}", equation),
        (None, Some(warning)) => println!("Warning: {}", warning),
        (None, None) => {}
    }
}

fn main() -> Result<()> {
    init_logging(&std::env::var("CHEMRXN_LOG").unwrap_or_else(|_| "warn".to_string()));

    let tables = ReferenceTables::standard();
    let predictor = ReplacementPredictor::new(tables);
    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.as_slice() {
        [] => {
            for (element, compound) in DEMO {
                let prediction = predictor.predict(element, compound);
                report(&format!("{} + {}", element, compound), &prediction, tables);
            }
        }
        [reactants] => report(reactants, &predictor.predict_reactants(reactants), tables),
        [element, compound] => report(
            &format!("{} + {}", element, compound),
            &predictor.predict(element, compound),
            tables,
        ),
        _ => bail!("usage: predict [<element> <compound> | \"<element> + <compound>\"]"),
    }
    Ok(())
}
