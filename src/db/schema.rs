diesel::table! {
    annotations (variant_key) {
        variant_key -> Text,
        gene -> Text,
        cadd -> Nullable<Double>,
        ml_score -> Nullable<Double>,
        most_severe_consequence -> Text,
        allele_freq -> Nullable<Double>,
        max_allele_freq -> Nullable<Double>,
        omim -> Text,
        clinsig -> Text,
    }
}

diesel::table! {
    transcripts (id) {
        id -> Int8,
        variant_key -> Text,
        transcript_id -> Text,
        polyphen -> Nullable<Double>,
        protein_notation -> Text,
        revel -> Nullable<Double>,
        splice_ai -> Nullable<Double>,
        mane -> Bool,
        loftee -> Text,
        impact -> Text,
        gerp -> Nullable<Double>,
        cdna_notation -> Text,
        consequences -> Text,
    }
}

diesel::joinable!(transcripts -> annotations (variant_key));
diesel::allow_tables_to_appear_in_same_query!(annotations, transcripts);
