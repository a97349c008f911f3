use kmon::symbolization::{DwarfSymbolizer, Symbolize, UNKNOWN};
use object::{Object, ObjectSymbol, SymbolKind};

#[test]
fn test_symbolizer_creation() {
    // Any ELF with debug info will do; use our own binary
    let binary_path = env!("CARGO_BIN_EXE_kmon");

    let symbolizer = DwarfSymbolizer::new(binary_path);
    assert!(symbolizer.is_ok(), "Failed to create symbolizer: {:?}", symbolizer.err());

    // A host binary has no kernel boundary symbols
    assert!(symbolizer.unwrap().kernel_layout().is_none());
}

#[test]
fn test_symbolizer_resolves_function_names() {
    let binary_path = env!("CARGO_BIN_EXE_kmon");
    let symbolizer = DwarfSymbolizer::new(binary_path).expect("Failed to create symbolizer");

    let data = std::fs::read(binary_path).unwrap();
    let file = object::File::parse(&*data).unwrap();

    // Sized text symbols that fit the 32-bit address space
    let candidates: Vec<(u32, u32)> = file
        .symbols()
        .filter(|sym| sym.kind() == SymbolKind::Text && sym.size() > 4)
        .filter_map(|sym| {
            Some((u32::try_from(sym.address()).ok()?, u32::try_from(sym.size()).ok()?))
        })
        .take(20)
        .collect();
    assert!(!candidates.is_empty(), "No text symbols in {binary_path}");

    let mut resolved = 0;
    for (address, size) in candidates {
        // An address inside the function should resolve back to it
        let eip = address + size / 2;
        let Some(info) = symbolizer.resolve(eip) else { continue };
        if info.function != UNKNOWN && info.function_start == address {
            assert_eq!(info.offset(eip), size / 2);
            resolved += 1;
        }
    }

    assert!(resolved > 0, "Symbolizer should resolve at least one address to its function");
}
