use crate::model::MedicationRecord;

/// Demo inventory loaded into an empty database.
pub fn demo_catalog() -> Vec<MedicationRecord> {
    [
        ("Paracetamol 500mg", 120, 2.50, "Genfar"),
        ("Paracetamol 1g", 40, 4.10, "MK"),
        ("Ibuprofeno 400mg", 85, 3.20, "Genfar"),
        ("Ibuprofeno 800mg", 0, 5.60, "MK"),
        ("Amoxicilina 500mg", 60, 7.80, "La Santé"),
        ("Amoxicilina 875mg", 15, 11.40, "Tecnoquímicas"),
        ("Omeprazol 20mg", 90, 4.90, "Genfar"),
        ("Aspirina 100mg", 200, 1.90, "Bayer"),
        ("Loratadina 10mg", 70, 3.50, "MK"),
        ("Diclofenaco 50mg", 0, 2.80, "Genfar"),
        ("Ciprofloxacino 500mg", 25, 9.30, "La Santé"),
        ("Cetirizina 10mg", 55, 3.70, "Tecnoquímicas"),
        ("Azitromicina 500mg", 18, 12.60, "Pfizer"),
        ("Enalapril 20mg", 45, 4.20, "Genfar"),
        ("Losartán 50mg", 65, 6.40, "MK"),
        ("Metformina 850mg", 110, 5.10, "Genfar"),
        ("Atorvastatina 20mg", 35, 9.90, "Pfizer"),
        ("Naproxeno 250mg", 0, 3.30, "La Santé"),
        ("Cefalexina 500mg", 22, 8.70, "MK"),
        ("Dexametasona 4mg", 12, 6.80, "Tecnoquímicas"),
        ("Levofloxacin 500mg", 9, 14.20, "Sanofi"),
        ("Alercit 5mg", 30, 10.50, "Siegfried"),
        ("Ventalog Inhalador", 6, 18.90, "Glenmark"),
        ("Tixel Jarabe", 14, 7.40, "Siegfried"),
    ]
    .into_iter()
    .map(|(name, stock, cost, brand)| MedicationRecord::new(name, stock, cost, brand))
    .collect()
}
