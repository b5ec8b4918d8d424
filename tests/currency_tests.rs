use family_budget::currency::{format_currency, CurrencyCode, CurrencyStyle};

#[test]
fn formats_euro_with_continental_separators() {
    let eur = CurrencyCode::new("eur");
    assert_eq!(format_currency(-1234.5, &eur), "-€1.234,50");
    assert_eq!(format_currency(1_000_000.0, &eur), "€1.000.000,00");
}

#[test]
fn unknown_codes_use_the_code_as_prefix() {
    let ars = CurrencyCode::new(" ars ");
    assert!(CurrencyStyle::for_code(&ars).is_none());
    assert_eq!(format_currency(1234.5, &ars), "ARS 1,234.50");
}

#[test]
fn values_rounding_to_zero_drop_the_sign() {
    let usd = CurrencyCode::new("USD");
    assert_eq!(format_currency(-0.001, &usd), "US$0.00");
    assert_eq!(format_currency(-0.4, &CurrencyCode::default()), "$0");
}

#[test]
fn overspend_variance_renders_negative() {
    let clp = CurrencyCode::default();
    assert_eq!(format_currency(150_000.0 - 165_000.0, &clp), "-$15.000");
}
