//! Test-only assembly of synthetic class files as raw byte vectors.
use byteorder::{BigEndian, WriteBytesExt};

use crate::classfile::CLASS_FILE_MAGIC;

/// Incrementally assembles a class file image. Pool helpers return the
/// 1-based index of the entry they add.
pub struct ClassBuilder {
    pool: Vec<u8>,
    entries: u16,
    methods: Vec<Vec<u8>>,
}

impl ClassBuilder {
    pub fn new() -> ClassBuilder {
        ClassBuilder {
            pool: Vec::new(),
            entries: 0,
            methods: Vec::new(),
        }
    }

    fn next_index(&mut self, slots: u16) -> u16 {
        let index = self.entries + 1;
        self.entries += slots;
        index
    }

    pub fn utf8(&mut self, text: &str) -> u16 {
        let index = self.next_index(1);
        self.pool.push(1);
        self.pool
            .write_u16::<BigEndian>(text.len() as u16)
            .unwrap();
        self.pool.extend_from_slice(text.as_bytes());
        index
    }

    pub fn integer(&mut self, value: i32) -> u16 {
        let index = self.next_index(1);
        self.pool.push(3);
        self.pool.write_i32::<BigEndian>(value).unwrap();
        index
    }

    pub fn float(&mut self, value: f32) -> u16 {
        let index = self.next_index(1);
        self.pool.push(4);
        self.pool.write_u32::<BigEndian>(value.to_bits()).unwrap();
        index
    }

    /// Longs occupy two pool slots; the next entry lands at `index + 2`.
    pub fn long(&mut self, value: i64) -> u16 {
        let index = self.next_index(2);
        self.pool.push(5);
        self.pool.write_i64::<BigEndian>(value).unwrap();
        index
    }

    pub fn class(&mut self, name_index: u16) -> u16 {
        let index = self.next_index(1);
        self.pool.push(7);
        self.pool.write_u16::<BigEndian>(name_index).unwrap();
        index
    }

    pub fn string(&mut self, utf8_index: u16) -> u16 {
        let index = self.next_index(1);
        self.pool.push(8);
        self.pool.write_u16::<BigEndian>(utf8_index).unwrap();
        index
    }

    pub fn field_ref(&mut self, class_index: u16, name_and_type_index: u16) -> u16 {
        let index = self.next_index(1);
        self.pool.push(9);
        self.pool.write_u16::<BigEndian>(class_index).unwrap();
        self.pool
            .write_u16::<BigEndian>(name_and_type_index)
            .unwrap();
        index
    }

    pub fn method_ref(&mut self, class_index: u16, name_and_type_index: u16) -> u16 {
        let index = self.next_index(1);
        self.pool.push(10);
        self.pool.write_u16::<BigEndian>(class_index).unwrap();
        self.pool
            .write_u16::<BigEndian>(name_and_type_index)
            .unwrap();
        index
    }

    pub fn name_and_type(&mut self, name_index: u16, descriptor_index: u16) -> u16 {
        let index = self.next_index(1);
        self.pool.push(12);
        self.pool.write_u16::<BigEndian>(name_index).unwrap();
        self.pool.write_u16::<BigEndian>(descriptor_index).unwrap();
        index
    }

    /// Appends raw entry bytes, for malformed-pool tests.
    pub fn raw_entry(&mut self, bytes: &[u8]) -> u16 {
        let index = self.next_index(1);
        self.pool.extend_from_slice(bytes);
        index
    }

    /// Adds a method whose only attribute is a `Code` attribute wrapping
    /// `code` with an empty exception table.
    #[allow(clippy::too_many_arguments)]
    pub fn method(
        &mut self,
        access_flags: u16,
        name_index: u16,
        descriptor_index: u16,
        code_name_index: u16,
        max_stack: u16,
        max_locals: u16,
        code: &[u8],
    ) {
        let mut payload = Vec::new();
        payload.write_u16::<BigEndian>(max_stack).unwrap();
        payload.write_u16::<BigEndian>(max_locals).unwrap();
        payload.write_u32::<BigEndian>(code.len() as u32).unwrap();
        payload.extend_from_slice(code);
        payload.write_u16::<BigEndian>(0).unwrap(); // exception_table_length
        payload.write_u16::<BigEndian>(0).unwrap(); // nested attributes_count

        let mut method = Vec::new();
        method.write_u16::<BigEndian>(access_flags).unwrap();
        method.write_u16::<BigEndian>(name_index).unwrap();
        method.write_u16::<BigEndian>(descriptor_index).unwrap();
        method.write_u16::<BigEndian>(1).unwrap(); // attributes_count
        method.write_u16::<BigEndian>(code_name_index).unwrap();
        method
            .write_u32::<BigEndian>(payload.len() as u32)
            .unwrap();
        method.extend_from_slice(&payload);
        self.methods.push(method);
    }

    pub fn method_without_code(&mut self, access_flags: u16, name_index: u16, descriptor_index: u16) {
        let mut method = Vec::new();
        method.write_u16::<BigEndian>(access_flags).unwrap();
        method.write_u16::<BigEndian>(name_index).unwrap();
        method.write_u16::<BigEndian>(descriptor_index).unwrap();
        method.write_u16::<BigEndian>(0).unwrap(); // attributes_count
        self.methods.push(method);
    }

    pub fn build(&self, this_class: u16) -> Vec<u8> {
        self.build_with_counts(this_class, 0, 0)
    }

    pub fn build_with_counts(
        &self,
        this_class: u16,
        interfaces_count: u16,
        fields_count: u16,
    ) -> Vec<u8> {
        let mut image = Vec::new();
        image.write_u32::<BigEndian>(CLASS_FILE_MAGIC).unwrap();
        image.write_u16::<BigEndian>(0).unwrap(); // minor_version
        image.write_u16::<BigEndian>(61).unwrap(); // major_version
        image.write_u16::<BigEndian>(self.entries + 1).unwrap();
        image.extend_from_slice(&self.pool);
        image.write_u16::<BigEndian>(0x0021).unwrap(); // ACC_PUBLIC | ACC_SUPER
        image.write_u16::<BigEndian>(this_class).unwrap();
        image.write_u16::<BigEndian>(0).unwrap(); // super_class
        image.write_u16::<BigEndian>(interfaces_count).unwrap();
        image.write_u16::<BigEndian>(fields_count).unwrap();
        image
            .write_u16::<BigEndian>(self.methods.len() as u16)
            .unwrap();
        for method in &self.methods {
            image.extend_from_slice(method);
        }
        image.write_u16::<BigEndian>(0).unwrap(); // class attributes_count
        image
    }
}

/// Constant pool indices of the `System.out` / `println` plumbing.
pub struct PrintlnSupport {
    pub out_field: u16,
    pub println_method: u16,
}

/// Registers the pool entries the print bridge resolves at run time.
pub fn println_support(builder: &mut ClassBuilder) -> PrintlnSupport {
    let system_name = builder.utf8("java/lang/System");
    let system_class = builder.class(system_name);
    let out_name = builder.utf8("out");
    let out_descriptor = builder.utf8("Ljava/io/PrintStream;");
    let out_nat = builder.name_and_type(out_name, out_descriptor);
    let out_field = builder.field_ref(system_class, out_nat);

    let stream_name = builder.utf8("java/io/PrintStream");
    let stream_class = builder.class(stream_name);
    let println_name = builder.utf8("println");
    let println_descriptor = builder.utf8("(I)V");
    let println_nat = builder.name_and_type(println_name, println_descriptor);
    let println_method = builder.method_ref(stream_class, println_nat);

    PrintlnSupport {
        out_field,
        println_method,
    }
}
